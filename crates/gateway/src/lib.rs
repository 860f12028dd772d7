//! The `walletlink` command-line tool: wiring of the flow manager plus
//! operator commands (wallet directory, proofs, config) and a console demo.

pub mod bootstrap;
pub mod cli;
pub mod console;
