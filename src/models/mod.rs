pub mod seat;
pub mod show;
pub mod user;

pub use seat::{Gender, Occupancy, SeatAssignment, SeatRequest};
pub use show::ShowKey;
pub use user::{Identity, Registration, User};
