mod analytics;
mod client;
mod coin;
mod debt;
mod ledger;
mod money;
mod notification;
mod sale;

pub use analytics::*;
pub use client::*;
pub use coin::*;
pub use debt::*;
pub use ledger::*;
pub use money::*;
pub use notification::*;
pub use sale::*;
