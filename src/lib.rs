/*!
Inspect CAR uploads and decide when their DAG is worth probing on a gateway

A CAR landing in the object store may hold a whole DAG or just one chunk of a
bigger upload. [`Inspector::inspect`] parses it, walks the DAG under its single
root to classify it as [`Structure::Complete`] or [`Structure::Partial`], and
estimates the full DAG size from a dag-pb root's declared link sizes.
[`Inspector::decide`] then weighs that against the bytes already stored under
the root's prefix.

```no_run
# use car_probe::{DirLister, Inspector, ProbeConfig, accumulated_size};
# use std::collections::HashMap;
# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
let bytes = std::fs::read("upload.car")?;
let inspector = Inspector::new(ProbeConfig::default());
let result = inspector.inspect(&bytes, &HashMap::new()).await?;

let lister = DirLister::new("/srv/store");
let stored = accumulated_size(&lister, &format!("raw/{}", result.root)).await?;
let decision = inspector.decide(&result, stored);
println!("{:?}: {}", decision.verdict, decision.reason);
# Ok(())
# }
```
*/

pub mod car;
pub mod codec;
pub mod config;
pub mod decide;
pub mod gateway;
pub mod inspect;
pub mod size;
pub mod store;
pub mod walk;

pub use car::{Block, CarArchive, CarError, Parser, parse};
pub use codec::{DecodeError, DecodedNode, PbLink, PbNode, decode};
pub use config::ProbeConfig;
pub use decide::{FetchDecision, Reason, Verdict, decide};
pub use gateway::{GatewayError, GatewayProbe, ProbeOutcome};
pub use inspect::{InspectError, InspectionResult, Inspector, StructureSource};
pub use size::{estimate, estimate_size};
pub use store::{DirLister, PrefixLister, StoreError, accumulated_size};
pub use walk::{Structure, WalkError, Walker, classify};
