pub(crate) mod single_flight;
