//! Command-line front end for SAS key verification.
//!
//! Each party runs `sasverify pubkey`, exchanges the printed key with the
//! peer, then runs `sasverify sas` and compares the output out of band.

pub mod commands;
