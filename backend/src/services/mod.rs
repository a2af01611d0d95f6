pub mod access;
pub mod buddy;
pub mod bus_child;
pub mod chat;
pub mod emergency;
pub mod live_location;
pub mod lost_found;
pub mod tour_day;

pub use buddy::BuddyService;
pub use bus_child::BusChildService;
pub use chat::{ChatModel, ChatService, GeminiClient};
pub use emergency::EmergencyService;
pub use live_location::LiveLocationService;
pub use lost_found::LostFoundService;
pub use tour_day::TourDayService;
