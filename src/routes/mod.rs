pub mod route_list;

pub use route_list::{RouteInfo, find, routes};
