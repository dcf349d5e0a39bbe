//! Workspace-wide check suite
//!
//! | Check      | Tool                         | Compiles |
//! |------------|------------------------------|----------|
//! | `clippy`   | cargo clippy                 | yes      |
//! | `doc`      | cargo doc                    | yes      |
//! | `fmt`      | cargo fmt                    | no       |
//! | `toml-fmt` | taplo                        | no       |
//! | `audit`    | cargo audit                  | no       |
//! | `deny`     | cargo deny                   | no       |
//! | `nextest`  | cargo nextest (partitioned)  | yes      |
//! | `hakari`   | built in (+ cargo hakari)    | no       |

pub mod consistency;
mod kind;
mod partition;
mod suite;

pub use consistency::{ConsistencyReport, Drift, HackRequirement};
pub use kind::{CheckKind, ToolSpec, CARGO_HAKARI};
pub use partition::{Partition, PartitionMode};
pub use suite::{select, CheckResult, CheckSuite, SuiteReport};
