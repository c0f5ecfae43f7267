use credminter_types::*;
use kube::CustomResourceExt;
use std::fs;

fn main() {
    fs::create_dir_all("../crds").unwrap();
    fs::write(
        "../crds/credminter.openshift.io_credentialsrequests_crd.yaml",
        serde_yaml::to_string(&CredentialsRequest::crd()).unwrap(),
    )
    .unwrap();
}
