//! Prints the Swxfll CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/swxfll.yaml
//! ```

use kube::CustomResourceExt;
use swxfll_operator::Swxfll;

fn main() -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(&Swxfll::crd())?);
    Ok(())
}
