use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

pub fn hash_password(password: &str) -> Result<String, password_hash::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    Ok(argon2.hash_password(password.as_bytes(), &salt)?.to_string())
}

pub fn verify_password(password: &str, hashed: &str) -> Result<(), password_hash::Error> {
    let argon2 = Argon2::default();
    let parsed = PasswordHash::new(hashed)?;

    argon2.verify_password(password.as_bytes(), &parsed)
}
