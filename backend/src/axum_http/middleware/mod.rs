pub mod route_guard;
pub mod session;
