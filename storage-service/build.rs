use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Rebuild if the service definitions change
    println!("cargo:rerun-if-changed=proto/csi.proto");
    println!("cargo:rerun-if-env-changed=PROTOC");

    // Fall back to the bundled protoc when the host has none configured
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()?;
        // SAFETY: build scripts are single threaded.
        unsafe { std::env::set_var("PROTOC", protoc) };
    }

    let includes = [
        PathBuf::from("proto"),
        protoc_bin_vendored::include_path()?,
    ];

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&["proto/csi.proto"], &includes)?;

    Ok(())
}
