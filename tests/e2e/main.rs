//! Whole-pipeline tests: config files on disk, a loaded map, and a message
//! stream run through the handler the way the service binary wires it.

mod config_file_tests;
mod pipeline_tests;
