pub mod chat;
pub mod onboard;
pub mod route;
pub mod serve;
pub mod session;
