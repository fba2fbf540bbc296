//! # Signing Demo
//!
//! Signs a payload with a device key and verifies it with the shared public
//! key, then shows a forged payload failing.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example signing_demo
//! ```

use vchat_core::crypto::asymmetric::{self, SignaturePadding, SignatureParams};
use vchat_core::crypto::{generate_key_pair, PublicKeyMaterial};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vchat_core=debug".into()),
        )
        .init();

    println!("=== vChat Core: Signing Demo ===\n");

    // Step 1: Keypair
    println!("Step 1: Generating a 2048-bit RSA keypair...");
    let (private, public) = generate_key_pair(2048).expect("Failed to generate keypair");
    let shared_pem = public.to_pkcs8_pem().expect("Failed to export public key");
    println!(
        "  Fingerprint: {}",
        public.fingerprint().expect("Failed to fingerprint")
    );
    println!();

    // Step 2: Sign
    let payload = b"device 1 announces key v2";
    println!("Step 2: Signing {:?}...", String::from_utf8_lossy(payload));
    for padding in [SignaturePadding::Pss, SignaturePadding::Pkcs1v15] {
        let params = SignatureParams {
            padding,
            ..SignatureParams::default()
        };
        let signature = asymmetric::sign(payload, &private, params).expect("Failed to sign");
        println!(
            "  {:?}: {}...",
            padding,
            &signature.to_base64()[..24]
        );

        // Step 3: Verify with the key as the peer received it
        let peer_view = PublicKeyMaterial::from_pem(&shared_pem).expect("Failed to parse PEM");
        let genuine = asymmetric::verify(payload, &signature, &peer_view, params)
            .expect("Malformed signature");
        let forged = asymmetric::verify(b"device 1 announces key v3", &signature, &peer_view, params)
            .expect("Malformed signature");
        println!("    genuine payload verifies: {}", genuine);
        println!("    forged payload verifies:  {}", forged);
    }
    println!();

    println!("=== Demo Complete ===");
}
