//! Save a service account key into the system keyring.
//!
//! cargo run -p credentials_storage --example store_credentials -- path/to/key.json
//!
//! Pass `--delete` to remove the stored key again. Access tokens are never
//! stored; export `FIRESTORE_ACCESS_TOKEN` instead.

use std::path::Path;

use credentials_storage::{delete_credentials, has_credentials, read_key_file, store_service_account_key};

fn main() {
    let Some(arg) = std::env::args().nth(1) else {
        eprintln!("Usage: store_credentials <service-account-key.json> | --delete");
        std::process::exit(1);
    };

    if arg == "--delete" {
        match delete_credentials() {
            Ok(_) => println!("Stored credentials removed"),
            Err(e) => eprintln!("Failed to delete credentials: {}", e),
        }
        return;
    }

    let key_json = match read_key_file(Path::new(&arg)) {
        Ok(key_json) => key_json,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = store_service_account_key(&key_json) {
        eprintln!("Failed to store credentials: {}", e);
        std::process::exit(1);
    }

    match has_credentials() {
        Ok(true) => println!("Service account key from '{}' stored", arg),
        Ok(false) => eprintln!("Key was written but could not be read back"),
        Err(e) => eprintln!("Failed to verify stored credentials: {}", e),
    }
}
