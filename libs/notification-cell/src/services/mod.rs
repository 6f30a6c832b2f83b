pub mod dispatcher;
pub mod inbox;

pub use dispatcher::NotificationDispatcher;
pub use inbox::NotificationService;
