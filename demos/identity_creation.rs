//! # Identity Creation Example
//!
//! Creates the device identity in a throwaway database, reopens it, rotates
//! its keys and exports the private key as encrypted PEM.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example identity_creation
//! ```

use vchat_core::{CoreConfig, VChatCore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vchat_core=debug".into()),
        )
        .init();

    println!("=== vChat Core: Identity Creation Example ===\n");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("vchat.db").to_string_lossy().into_owned();
    let config = CoreConfig {
        storage_path: Some(path.clone()),
        rsa_key_bits: 2048,
        ..CoreConfig::default()
    };

    // Step 1: First run creates the identity
    println!("Step 1: Opening a fresh store at {}...", path);
    let core = VChatCore::open(config.clone()).expect("Failed to open core");
    println!("  State: {:?}", core.identity_state().expect("Failed to read state"));

    let identity = core
        .ensure_identity()
        .await
        .expect("Failed to create identity");
    let public = identity.public_identity().expect("Failed to derive public identity");
    println!("  Identifier:  {}", public.identifier);
    println!("  Fingerprint: {}", public.fingerprint);
    println!();

    // Step 2: Second run loads it
    println!("Step 2: Reopening the store...");
    drop(core);
    let core = VChatCore::open(config).expect("Failed to reopen core");
    let loaded = core.ensure_identity().await.expect("Failed to load identity");
    if loaded == identity {
        println!("  [OK] Same identity after reopen");
    } else {
        println!("  [FAILED] Identity changed after reopen!");
    }
    println!();

    // Step 3: Rotate keys
    println!("Step 3: Rotating keys...");
    let rotated = core
        .rotate_identity_keys()
        .await
        .expect("Failed to rotate keys");
    let rotated_public = rotated.public_identity().expect("Failed to derive public identity");
    println!("  Identifier:  {}", rotated_public.identifier);
    println!("  Fingerprint: {}", rotated_public.fingerprint);
    println!();

    // Step 4: Export
    println!("Step 4: Exporting the private key...");
    let pem = core
        .export_private_key("demo password")
        .expect("Failed to export key");
    for line in pem.lines().take(3) {
        println!("  {}", line);
    }
    println!("  ...");
    println!();

    println!("=== Example Complete ===");
}
