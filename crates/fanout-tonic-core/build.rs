/// Builds the gRPC client and server code for `fanout.proto` using
/// `tonic-prost-build`.
///
/// Besides the message types and service traits, a file descriptor set is
/// written next to the generated code so that the server can expose gRPC
/// reflection.
///
/// # Files and Paths
///
/// - Proto file: `proto/fanout.proto`
/// - Includes: `proto/`
/// - Descriptor set: `$OUT_DIR/fanout_descriptor.bin`
///
/// # Panics
///
/// Panics if `OUT_DIR` is unset or if code generation fails (for instance
/// when `protoc` is not installed).
use std::env;
use std::path::PathBuf;

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let descriptor_path = out_dir.join("fanout_descriptor.bin");

    println!("cargo:rerun-if-changed=proto/fanout.proto");

    let mut config = tonic_prost_build::Config::new();
    config.file_descriptor_set_path(&descriptor_path);

    tonic_prost_build::configure()
        .compile_with_config(config, &["proto/fanout.proto"], &["proto"])
        .expect("failed to compile proto/fanout.proto");
}
