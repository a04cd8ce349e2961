//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter | Implements                         | Connects to                 |
//! |---------|------------------------------------|-----------------------------|
//! | `net`   | SocketHal                          | `std::net` TCP (host, IDF)  |
//! | `gpio`  | InterruptHal                       | ESP-IDF GPIO ISR service    |
//! | `sim`   | every port                         | in-memory, for host + tests |

#[cfg(target_os = "espidf")]
pub mod gpio;
pub mod net;
pub mod sim;
