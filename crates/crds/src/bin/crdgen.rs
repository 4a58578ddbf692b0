//! Prints the ServiceExport CRD manifest.
//!
//! ```sh
//! cargo run -p crds --bin crdgen > config/crd/serviceexport.yaml
//! ```

use crds::ServiceExport;
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&ServiceExport::crd())?);
    Ok(())
}
