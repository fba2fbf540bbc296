//! # Encryption Demo
//!
//! Bob seals a conversation key to Alice's device, then both sides use it
//! for chat content.
//!
//! ## Run
//!
//! ```bash
//! cargo run --example encryption_demo
//! ```

use std::sync::Arc;

use vchat_core::crypto::sealed;
use vchat_core::{ChatHistoryRecord, ContactRecord, CoreConfig, MemoryStore, RecordStore, VChatCore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,vchat_core=debug".into()),
        )
        .init();

    println!("=== vChat Core: End-to-End Encryption Demo ===\n");

    let config = CoreConfig {
        rsa_key_bits: 2048,
        ..CoreConfig::default()
    };

    // Step 1: Two devices
    println!("Step 1: Creating identities for Alice and Bob...");
    let alice = VChatCore::with_store(config.clone(), Arc::new(MemoryStore::new()))
        .expect("Failed to create Alice's core");
    let bob = VChatCore::with_store(config, Arc::new(MemoryStore::new()))
        .expect("Failed to create Bob's core");

    let alice_identity = alice.ensure_identity().await.expect("Alice identity");
    let announced = alice_identity.public_identity().expect("Alice public identity");
    println!("  Alice: {}", announced.identifier);
    println!();

    // Step 2: Key exchange
    println!("Step 2: Bob seals a conversation key to Alice's device (RSA-OAEP)...");
    let conversation_key = bob.generate_conversation_key();
    let alice_device_key = announced.public_key().expect("Fingerprint mismatch");

    let mut contact = ContactRecord::new("alice", "Alice", None);
    let blob = contact
        .seal_key_for(announced.identifier, &conversation_key, &alice_device_key)
        .expect("Failed to seal key");
    bob.store().insert_contact(&contact).expect("Failed to store contact");
    println!("  Blob: {}...", &blob[..32]);

    let opened = contact
        .open_key_for(
            announced.identifier,
            &alice_identity.private_key().expect("Alice private key"),
        )
        .expect("Failed to open blob")
        .expect("No blob for device");
    if opened == conversation_key {
        println!("  [OK] Alice recovered the conversation key");
    } else {
        println!("  [FAILED] Keys differ!");
    }
    println!();

    // Step 3: CBC chat content
    println!("Step 3: Storing an encrypted message in Bob's history (AES-CBC)...");
    let entry = ChatHistoryRecord::sealed_text(
        "Hi Alice, meet at noon?",
        &conversation_key,
        Some(contact.uid.clone()),
        false,
    )
    .expect("Failed to seal message");
    bob.store().append_history(&entry).expect("Failed to store message");
    println!("  Stored {} bytes (IV + ciphertext)", entry.content.len());

    let text = entry.open_text(&opened).expect("Failed to open message");
    println!("  Alice reads: {:?}", text);
    println!();

    // Step 4: Authenticated sealed box
    println!("Step 4: Sealing with AES-GCM...");
    let boxed = sealed::seal(&opened, b"See you then", b"alice->bob").expect("Failed to seal");
    let wire = boxed.to_bytes();
    println!("  Sealed box: {} bytes", wire.len());

    let received = sealed::SealedBox::from_bytes(&wire).expect("Malformed box");
    let reply = sealed::open(&conversation_key, &received, b"alice->bob").expect("Failed to open");
    println!("  Bob reads: {:?}", String::from_utf8_lossy(&reply));

    let mut tampered = wire;
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    let tampered = sealed::SealedBox::from_bytes(&tampered).expect("Malformed box");
    match sealed::open(&conversation_key, &tampered, b"alice->bob") {
        Err(e) => println!("  [OK] Tampered box rejected: {}", e),
        Ok(_) => println!("  [FAILED] Tampered box accepted!"),
    }
    println!();

    println!("=== Demo Complete ===");
}
