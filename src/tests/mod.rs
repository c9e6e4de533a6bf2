pub mod integration_test;
