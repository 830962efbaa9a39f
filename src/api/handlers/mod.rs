pub mod auth;
pub mod chats;
pub mod dashboard;
pub mod geocode;
pub mod hirings;
pub mod messages;
pub mod rooms;
pub mod users;
