//! Build script for xpc-sys.
//!
//! Emits link directives for the vendor xpcapi library only when the
//! `xpc-sdk` feature is enabled. Without it the crate still compiles, and
//! nothing may call into the declarations.

fn main() {
    println!("cargo:rerun-if-env-changed=XPCAPI_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_XPC_SDK").is_none() {
        return;
    }

    if let Ok(dir) = std::env::var("XPCAPI_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
    } else {
        // Fallback to standard locations
        let lib_paths = ["/usr/local/lib", "/usr/lib", "C:\\xpcapi\\lib"];
        for path in lib_paths {
            let dir = std::path::Path::new(path);
            if dir.join("libxpcapi.so").exists() || dir.join("xpcapi.lib").exists() {
                println!("cargo:rustc-link-search=native={}", path);
                break;
            }
        }
    }
    println!("cargo:rustc-link-lib=xpcapi");
}
