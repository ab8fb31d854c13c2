mod helpers;
mod local_tests;
