fn main() {
    unsafe {
        std::env::set_var(
            "PROTOC",
            protoc_bin_vendored::protoc_bin_path().expect("bundled protoc binary not found"),
        );
    }
    println!("cargo:rerun-if-changed=proto/raito_store.proto");
    prost_build::compile_protos(&["proto/raito_store.proto"], &["proto/"])
        .expect("failed to compile raito_store.proto");
}
