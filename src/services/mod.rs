pub mod auth;
pub mod chat;
pub mod dashboard;
pub mod geocoding;
pub mod hirings;
pub mod mailer;
pub mod requests;
pub mod rooms;
pub mod sessions;

#[cfg(test)]
pub(crate) mod test_db;
