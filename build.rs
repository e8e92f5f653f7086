fn main() {
    println!("cargo:rerun-if-changed=proto/bidofferv3.proto");
    prost_build::compile_protos(&["proto/bidofferv3.proto"], &["proto/"])
        .expect("failed to compile bidofferv3.proto");
}
