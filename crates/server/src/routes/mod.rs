pub mod health;
pub mod session_ws;
