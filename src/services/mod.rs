pub mod ledger;
pub mod notification;
pub mod password;
