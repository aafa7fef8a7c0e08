//! srvx-ng - Modular IRC services daemon (Next Generation)
//!
//! A single-threaded, event-driven services package: channel registration
//! and access control (ChanServ), a module/service command-dispatch
//! framework, and the timer/database substrate they share.

pub mod accounts;
pub mod actions;
pub mod chanserv;
pub mod conf;
pub mod ircstr;
pub mod modcmd;
pub mod msg;
pub mod policer;
pub mod reactor;
pub mod recdb;
pub mod saxdb;
pub mod state;
pub mod timerq;
