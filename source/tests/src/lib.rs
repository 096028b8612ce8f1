//! End-to-end tests: real gRPC servers on real sockets, config files on a
//! real filesystem, probes against live endpoints.

#[cfg(test)]
mod common;

#[cfg(test)]
mod check_federation_loop;
#[cfg(test)]
mod check_hot_reload;
#[cfg(test)]
mod check_http_provider;
#[cfg(test)]
mod check_server_and_client;
