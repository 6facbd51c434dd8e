//! One adapter per hashing algorithm plus salt generation.
//! Every adapter takes `(password, salt)` as raw bytes and returns the raw
//! digest; hex encoding happens once, in `passwords::hash`.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::alphabet::BCRYPT;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use hmac::Hmac;
use md5::Md5;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use super::algorithm::HashingAlgorithm;
use super::passwords::HashError;

/// Length of the random salt generated for every algorithm except bcrypt.
pub const SALT_LEN: usize = 16;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
const PBKDF2_OUTPUT_LEN: usize = 32;

/// Argon2id parameters: 2 passes over 100 MiB with 8 lanes, 32 byte output.
const ARGON2_TIME_COST: u32 = 2;
const ARGON2_MEMORY_COST_KIB: u32 = 102_400;
const ARGON2_PARALLELISM: u32 = 8;
const ARGON2_OUTPUT_LEN: usize = 32;
pub const ARGON2_MIN_SALT_LEN: usize = 16;

/// scrypt with N = 2^14, r = 8, p = 1 and the default 64 byte output.
const SCRYPT_LOG_N: u8 = 14;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;
const SCRYPT_OUTPUT_LEN: usize = 64;

pub const BCRYPT_COST: u32 = 12;
/// Only the trailing digest characters of bcrypt's encoded output are kept.
pub const BCRYPT_DIGEST_LEN: usize = 31;
const BCRYPT_SALT_CHARS: usize = 22;
const BCRYPT_RAW_SALT_LEN: usize = 16;

const BCRYPT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &BCRYPT,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Signature shared by all adapters.
pub type Adapter = fn(&[u8], &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError>;

/// Dispatch table keyed by algorithm. Adding an algorithm means adding a
/// variant, and the compiler points here.
pub fn adapter_for(algorithm: HashingAlgorithm) -> Adapter {
    match algorithm {
        HashingAlgorithm::Md5 => hash_md5,
        HashingAlgorithm::Sha512 => hash_sha512,
        HashingAlgorithm::Pbkdf2 => hash_pbkdf2,
        HashingAlgorithm::Argon2 => hash_argon2,
        HashingAlgorithm::Bcrypt => hash_bcrypt,
        HashingAlgorithm::Scrypt => hash_scrypt,
    }
}

/// Produces a fresh salt for `algorithm`. bcrypt gets its own encoded salt
/// string (`$2b$12$` plus 22 characters); everything else gets 16 random bytes.
pub fn generate_salt(algorithm: HashingAlgorithm) -> Result<Vec<u8>, HashError> {
    match algorithm {
        HashingAlgorithm::Bcrypt => bcrypt_salt(BCRYPT_COST),
        _ => random_bytes(SALT_LEN),
    }
}

fn random_bytes(len: usize) -> Result<Vec<u8>, HashError> {
    fill_random(&mut OsRng, len)
}

fn fill_random(rng: &mut impl RngCore, len: usize) -> Result<Vec<u8>, HashError> {
    let mut bytes = vec![0u8; len];
    rng.try_fill_bytes(&mut bytes)
        .map_err(|e| HashError::RandomSource(e.to_string()))?;
    Ok(bytes)
}

pub(crate) fn bcrypt_salt(cost: u32) -> Result<Vec<u8>, HashError> {
    let raw = random_bytes(BCRYPT_RAW_SALT_LEN)?;
    let encoded = format!("$2b${:02}${}", cost, BCRYPT_BASE64.encode(raw));
    Ok(encoded.into_bytes())
}

fn primitive_failure<E: fmt::Display>(
    algorithm: HashingAlgorithm,
) -> impl FnOnce(E) -> HashError {
    move |err| HashError::Primitive {
        algorithm,
        reason: err.to_string(),
    }
}

fn hash_md5(password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError> {
    let mut hasher = Md5::new();
    hasher.update(salt);
    hasher.update(password);
    Ok(Zeroizing::new(hasher.finalize().to_vec()))
}

fn hash_sha512(password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(password);
    Ok(Zeroizing::new(hasher.finalize().to_vec()))
}

fn hash_pbkdf2(password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError> {
    let mut output = Zeroizing::new(vec![0u8; PBKDF2_OUTPUT_LEN]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, PBKDF2_ITERATIONS, output.as_mut_slice())
        .map_err(primitive_failure(HashingAlgorithm::Pbkdf2))?;
    Ok(output)
}

fn hash_argon2(password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError> {
    if salt.len() < ARGON2_MIN_SALT_LEN {
        return Err(HashError::SaltTooShort {
            algorithm: HashingAlgorithm::Argon2,
            minimum: ARGON2_MIN_SALT_LEN,
            actual: salt.len(),
        });
    }

    let params = Params::new(
        ARGON2_MEMORY_COST_KIB,
        ARGON2_TIME_COST,
        ARGON2_PARALLELISM,
        Some(ARGON2_OUTPUT_LEN),
    )
    .map_err(primitive_failure(HashingAlgorithm::Argon2))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = Zeroizing::new(vec![0u8; ARGON2_OUTPUT_LEN]);
    argon2
        .hash_password_into(password, salt, output.as_mut_slice())
        .map_err(primitive_failure(HashingAlgorithm::Argon2))?;
    Ok(output)
}

/// bcrypt hashes with the version and cost recorded in its encoded salt, then
/// keeps only the last 31 bytes of the encoded result. The `$2b$12$` prefix and
/// the salt characters are dropped; they live on in the stored salt instead.
fn hash_bcrypt(password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError> {
    let (version, cost, raw_salt) = parse_bcrypt_salt(salt)?;
    let parts = bcrypt::hash_with_salt(password, cost, raw_salt)
        .map_err(primitive_failure(HashingAlgorithm::Bcrypt))?;
    let encoded = Zeroizing::new(parts.format_for_version(version));

    let bytes = encoded.as_bytes();
    let start = bytes
        .len()
        .checked_sub(BCRYPT_DIGEST_LEN)
        .ok_or_else(|| HashError::Primitive {
            algorithm: HashingAlgorithm::Bcrypt,
            reason: "encoded output shorter than digest".to_string(),
        })?;
    Ok(Zeroizing::new(bytes[start..].to_vec()))
}

/// Splits `$<version>$<cost>$<22 salt chars>` into its parts. Anything after
/// the 22 salt characters is ignored, matching how bcrypt reads a full hash
/// passed in as a salt.
fn parse_bcrypt_salt(
    salt: &[u8],
) -> Result<(bcrypt::Version, u32, [u8; BCRYPT_RAW_SALT_LEN]), HashError> {
    let invalid = |reason: &str| HashError::InvalidSalt(format!("bcrypt salt {reason}"));

    let encoded = std::str::from_utf8(salt).map_err(|_| invalid("is not ASCII"))?;
    let mut fields = encoded.splitn(4, '$');
    let (Some(""), Some(version), Some(cost), Some(salt_chars)) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(invalid("must look like $2b$<cost>$<salt>"));
    };

    let version = match version {
        "2a" => bcrypt::Version::TwoA,
        "2b" => bcrypt::Version::TwoB,
        "2x" => bcrypt::Version::TwoX,
        "2y" => bcrypt::Version::TwoY,
        _ => return Err(invalid("has an unknown version")),
    };
    let cost: u32 = cost.parse().map_err(|_| invalid("has a non-numeric cost"))?;

    let salt_chars = salt_chars
        .get(..BCRYPT_SALT_CHARS)
        .ok_or_else(|| invalid("is shorter than 22 characters"))?;
    let decoded = BCRYPT_BASE64
        .decode(salt_chars)
        .map_err(|e| HashError::InvalidSalt(format!("bcrypt salt is not bcrypt-base64: {e}")))?;
    let raw: [u8; BCRYPT_RAW_SALT_LEN] = decoded
        .try_into()
        .map_err(|_| invalid("does not decode to 16 bytes"))?;

    Ok((version, cost, raw))
}

fn hash_scrypt(password: &[u8], salt: &[u8]) -> Result<Zeroizing<Vec<u8>>, HashError> {
    let params = scrypt::Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_OUTPUT_LEN)
        .map_err(primitive_failure(HashingAlgorithm::Scrypt))?;
    let mut output = Zeroizing::new(vec![0u8; SCRYPT_OUTPUT_LEN]);
    scrypt::scrypt(password, salt, &params, output.as_mut_slice())
        .map_err(primitive_failure(HashingAlgorithm::Scrypt))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_prepends_salt() {
        let digest = hash_md5(b"c", b"ab").expect("md5 should succeed");
        assert_eq!(hex::encode(digest.as_slice()), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn sha512_prepends_salt() {
        let digest = hash_sha512(b"bc", b"a").expect("sha512 should succeed");
        assert_eq!(
            hex::encode(digest.as_slice()),
            "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a\
             2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
        );
    }

    #[test]
    fn pbkdf2_matches_known_answer() {
        let digest =
            hash_pbkdf2(b"password", b"0123456789abcdef").expect("pbkdf2 should succeed");
        assert_eq!(
            hex::encode(digest.as_slice()),
            "a75190a792cd59d6d9c8c3a63b11c276ad449972b7886e1c2d819c286053366f"
        );
    }

    #[test]
    fn argon2id_matches_known_answer() {
        let digest =
            hash_argon2(b"password", b"0123456789abcdef").expect("argon2 should succeed");
        assert_eq!(
            hex::encode(digest.as_slice()),
            "83479d3219ccebbc48210b4b3c0c7f2e168fe3baa664a6fd954fa380329f7c16"
        );
    }

    #[test]
    fn scrypt_matches_reference_vector() {
        let digest =
            hash_scrypt(b"pleaseletmein", b"SodiumChloride").expect("scrypt should succeed");
        assert_eq!(
            hex::encode(digest.as_slice()),
            "7023bdcb3afd7348461c06cd81fd38ebfda8fbba904f8e3ea9b543f6545da1f2\
             d5432955613f0fcf62d49705242a9af9e61e85dc0d651e40dfcf017b45575887"
        );
    }

    #[test]
    fn argon2_rejects_short_salts() {
        let err = hash_argon2(b"password", &[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            HashError::SaltTooShort { minimum: 16, actual: 8, .. }
        ));
    }

    struct FailingRng;

    impl RngCore for FailingRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, _dest: &mut [u8]) {}

        fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new("entropy unavailable"))
        }
    }

    #[test]
    fn rng_failure_is_not_blamed_on_the_salt() {
        let err = fill_random(&mut FailingRng, SALT_LEN).unwrap_err();
        assert!(matches!(err, HashError::RandomSource(_)));
        assert!(err.to_string().contains("entropy unavailable"));
    }

    #[test]
    fn generated_salts_have_expected_shape() {
        let salt = generate_salt(HashingAlgorithm::Sha512).expect("salt");
        assert_eq!(salt.len(), SALT_LEN);

        let bcrypt_salt = generate_salt(HashingAlgorithm::Bcrypt).expect("salt");
        let text = String::from_utf8(bcrypt_salt).expect("bcrypt salt is ascii");
        assert_eq!(text.len(), 29);
        assert!(text.starts_with("$2b$12$"));
    }

    #[test]
    fn bcrypt_matches_known_answer() {
        let salt = b"$2a$05$CCCCCCCCCCCCCCCCCCCCC.";
        let digest = hash_bcrypt(b"U*U", salt).expect("bcrypt should succeed");
        assert_eq!(digest.as_slice(), b"E5YPO9kmyuRGyh0XouQYb4YMJKvyOeW");
    }

    #[test]
    fn bcrypt_digest_completes_the_native_encoding() {
        let salt = bcrypt_salt(4).expect("salt");
        let digest = hash_bcrypt(b"hunter2", &salt).expect("bcrypt should succeed");
        assert_eq!(digest.len(), BCRYPT_DIGEST_LEN);

        let mut full = String::from_utf8(salt).expect("ascii salt");
        full.push_str(std::str::from_utf8(&digest).expect("ascii digest"));
        assert!(bcrypt::verify("hunter2", &full).expect("native verify"));
        assert!(!bcrypt::verify("hunter3", &full).expect("native verify"));
    }

    #[test]
    fn bcrypt_rejects_malformed_salts() {
        let salts: [&[u8]; 4] = [
            b"not-a-salt",
            b"$9z$04$abcdefghijklmnopqrstuv",
            b"$2b$04$short",
            &[0u8; 16],
        ];
        for salt in salts {
            assert!(matches!(hash_bcrypt(b"pw", salt), Err(HashError::InvalidSalt(_))));
        }
    }

    #[test]
    fn bcrypt_rejects_out_of_range_cost() {
        let salt = b"$2b$99$EGdrhbKUv8Oc9vGiXX0HQO";
        assert!(matches!(
            hash_bcrypt(b"pw", salt),
            Err(HashError::Primitive { algorithm: HashingAlgorithm::Bcrypt, .. })
        ));
    }
}
