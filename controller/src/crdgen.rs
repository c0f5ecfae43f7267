//! CRD Generator
//!
//! Emits the `CredentialsRequest` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use credminter_types::CredentialsRequest;
use kube::core::CustomResourceExt;

fn main() {
    match serde_yaml::to_string(&CredentialsRequest::crd()) {
        Ok(yaml) => print!("{}", yaml),
        Err(e) => {
            eprintln!("failed to serialize CredentialsRequest CRD to YAML: {}", e);
            std::process::exit(1);
        }
    }
}
