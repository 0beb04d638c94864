//! PKCS#12 container decoding via `p12-keystore`.
//!
//! `p12-keystore` indexes entries by alias, which loses the order the bags
//! appear in the file. A second pass over the PFX recovers that order from
//! the bags' friendlyName attributes so aliases list as the container
//! stores them.

use super::{AnchorEntry, AnchorStore, StoreFormat};
use crate::cert::Certificate;
use crate::TrustprobeError;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockCipher, BlockDecrypt, BlockDecryptMut, KeyInit, KeyIvInit};
use cms::cert::x509::spki::AlgorithmIdentifierOwned;
use cms::content_info::ContentInfo;
use cms::encrypted_data::EncryptedData;
use der::asn1::{BmpString, OctetString};
use der::oid::ObjectIdentifier;
use der::{Decode, Encode};
use des::TdesEde3;
use p12_keystore::{KeyStore, KeyStoreEntry};
use pkcs12::authenticated_safe::AuthenticatedSafe;
use pkcs12::kdf::{self, Pkcs12KeyType};
use pkcs12::pbe_params::Pkcs12PbeParams;
use pkcs12::pfx::Pfx;
use pkcs12::safe_bag::{SafeBag, SafeContents};
use rc2::Rc2;
use sha1::Sha1;
use tracing::debug;

const DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
const ENCRYPTED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.6");
const PBES2: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.5.13");
const PBE_SHA1_3DES: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.3");
const PBE_SHA1_RC2_40: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.1.6");
const SHROUDED_KEY_BAG: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.2");
const CERT_BAG: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.12.10.1.3");
const FRIENDLY_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.20");
const LOCAL_KEY_ID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.21");

/// Failures of the bag-order pass. These never fail a load; the entries
/// then keep the order `p12-keystore` returns.
#[derive(Debug, thiserror::Error)]
enum BagOrderError {
    #[error("malformed PKCS12 structure: {0}")]
    Der(#[from] der::Error),

    #[error("cannot decrypt safe contents: {0}")]
    Decrypt(String),

    #[error("unsupported content type or encryption scheme {0}")]
    Unsupported(ObjectIdentifier),
}

/// Decode a PKCS#12 container. Trusted certificate bags become trusted
/// entries; private keys with their chains become key entries. Entries
/// keep the order of their bags in the file.
pub fn decode(bytes: &[u8], password: &str) -> Result<AnchorStore, TrustprobeError> {
    let keystore = KeyStore::from_pkcs12(bytes, password)
        .map_err(|e| TrustprobeError::Pkcs12(e.to_string()))?;

    let order = bag_aliases(bytes, password).unwrap_or_else(|e| {
        debug!(error = %e, "PKCS12 bag order unavailable, keeping alias order");
        Vec::new()
    });
    let mut entries: Vec<(&String, &KeyStoreEntry)> = keystore.entries().collect();
    // Stable: aliases missing from `order` stay at the end in their own order.
    entries.sort_by_key(|(alias, _)| {
        order
            .iter()
            .position(|name| name == *alias)
            .unwrap_or(usize::MAX)
    });

    let mut store = AnchorStore::with_format(StoreFormat::Pkcs12);
    for (alias, entry) in entries {
        match entry {
            KeyStoreEntry::Certificate(cert) => {
                store.push(AnchorEntry::trusted(alias.as_str(), convert(cert)?));
            }
            KeyStoreEntry::PrivateKeyChain(key_chain) => {
                let chain = key_chain
                    .chain()
                    .iter()
                    .map(convert)
                    .collect::<Result<Vec<_>, _>>()?;
                store.push(AnchorEntry::private_key(
                    alias.as_str(),
                    key_chain.key().to_vec(),
                    chain,
                ));
            }
            KeyStoreEntry::Secret(_) => {
                debug!(alias = alias.as_str(), "skipping PKCS12 secret key entry");
            }
        }
    }
    Ok(store)
}

fn convert(cert: &p12_keystore::Certificate) -> Result<Certificate, TrustprobeError> {
    Certificate::from_der(cert.as_der()).map_err(|e| TrustprobeError::Pkcs12(e.to_string()))
}

/// friendlyName of every trusted-certificate and private-key bag, in file
/// order, without duplicates.
fn bag_aliases(bytes: &[u8], password: &str) -> Result<Vec<String>, BagOrderError> {
    let pfx = Pfx::from_der(bytes)?;
    if pfx.auth_safe.content_type != DATA {
        return Err(BagOrderError::Unsupported(pfx.auth_safe.content_type));
    }
    let safes = AuthenticatedSafe::from_der(&octets(&pfx.auth_safe)?)?;

    let mut aliases = Vec::new();
    for safe in &safes {
        let contents = match safe.content_type {
            DATA => octets(safe)?,
            ENCRYPTED_DATA => {
                let encrypted = EncryptedData::from_der(&safe.content.to_der()?)?;
                let info = &encrypted.enc_content_info;
                match &info.encrypted_content {
                    Some(data) => decrypt(&info.content_enc_alg, data.as_bytes(), password)?,
                    None => continue,
                }
            }
            other => return Err(BagOrderError::Unsupported(other)),
        };
        for bag in SafeContents::from_der(&contents)? {
            if let Some(alias) = bag_alias(&bag) {
                if !aliases.contains(&alias) {
                    aliases.push(alias);
                }
            }
        }
    }
    Ok(aliases)
}

fn octets(info: &ContentInfo) -> Result<Vec<u8>, BagOrderError> {
    Ok(OctetString::from_der(&info.content.to_der()?)?.into_bytes())
}

/// Alias a bag contributes. Certificates carrying a localKeyId belong to a
/// key entry, which is named by its key bag.
fn bag_alias(bag: &SafeBag) -> Option<String> {
    let attributes = bag.bag_attributes.as_ref()?;
    let names_entry = match bag.bag_id {
        SHROUDED_KEY_BAG => true,
        CERT_BAG => !attributes.iter().any(|a| a.oid == LOCAL_KEY_ID),
        _ => false,
    };
    if !names_entry {
        return None;
    }
    let value = attributes
        .iter()
        .find(|a| a.oid == FRIENDLY_NAME)?
        .values
        .iter()
        .next()?
        .to_der()
        .ok()?;
    BmpString::from_der(&value).ok().map(|name| name.to_string())
}

fn decrypt(
    algorithm: &AlgorithmIdentifierOwned,
    data: &[u8],
    password: &str,
) -> Result<Vec<u8>, BagOrderError> {
    let params = algorithm
        .parameters
        .as_ref()
        .ok_or(BagOrderError::Unsupported(algorithm.oid))?
        .to_der()?;
    match algorithm.oid {
        PBES2 => pkcs5::pbes2::Parameters::from_der(&params)?
            .decrypt(password.as_bytes(), data)
            .map_err(|e| BagOrderError::Decrypt(e.to_string())),
        PBE_SHA1_3DES => legacy_decrypt::<TdesEde3>(&params, data, password, 24),
        PBE_SHA1_RC2_40 => legacy_decrypt::<Rc2>(&params, data, password, 5),
        other => Err(BagOrderError::Unsupported(other)),
    }
}

/// RFC 7292 appendix B password-based encryption with SHA-1 key derivation.
fn legacy_decrypt<C>(
    params: &[u8],
    data: &[u8],
    password: &str,
    key_len: usize,
) -> Result<Vec<u8>, BagOrderError>
where
    C: KeyInit + BlockCipher + BlockDecrypt,
{
    let params = Pkcs12PbeParams::from_der(params)?;
    let salt = params.salt.as_bytes();
    let key = kdf::derive_key_utf8::<Sha1>(
        password,
        salt,
        Pkcs12KeyType::EncryptionKey,
        params.iterations,
        key_len,
    )?;
    let iv = kdf::derive_key_utf8::<Sha1>(password, salt, Pkcs12KeyType::Iv, params.iterations, 8)?;
    cbc::Decryptor::<C>::new_from_slices(&key, &iv)
        .map_err(|e| BagOrderError::Decrypt(e.to_string()))?
        .decrypt_padded_vec_mut::<Pkcs7>(data)
        .map_err(|e| BagOrderError::Decrypt(e.to_string()))
}

/// Heuristic: the bytes start like a PFX structure (a DER SEQUENCE whose
/// first element is INTEGER 3).
pub fn looks_like_pfx(bytes: &[u8]) -> bool {
    let Some((&0x30, rest)) = bytes.split_first() else {
        return false;
    };
    // Skip the SEQUENCE length octets.
    let Some((&len, rest)) = rest.split_first() else {
        return false;
    };
    let rest = if len & 0x80 != 0 {
        rest.get(usize::from(len & 0x7f)..).unwrap_or_default()
    } else {
        rest
    };
    rest.starts_with(&[0x02, 0x01, 0x03])
}
