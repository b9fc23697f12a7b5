//! Decoded view of the leaf certificate a peer presents.

use chrono::{DateTime, TimeZone, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::nid::Nid;
use openssl::x509::{X509NameRef, X509Ref, X509};

use crate::error::CheckError;

/// The leaf certificate presented by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedCertificate {
    pub subject_common_name: Option<String>,
    /// DNS entries of the subjectAltName extension
    pub subject_alt_names: Vec<String>,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Decimal rendering of the serial number
    pub serial_number: String,
    /// `/CN=...` style rendering of the subject
    pub subject_name: String,
    /// `/CN=...` style rendering of the issuer
    pub issuer_name: String,
    pub raw_der: Vec<u8>,
    /// DER SubjectPublicKeyInfo
    pub public_key_der: Vec<u8>,
}

impl FetchedCertificate {
    pub fn from_x509(cert: &X509Ref) -> Result<Self, CheckError> {
        let subject_common_name = cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().to_string().ok());

        let subject_alt_names = cert
            .subject_alt_names()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| name.dnsname().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();

        Ok(FetchedCertificate {
            subject_common_name,
            subject_alt_names,
            not_before: to_utc(cert.not_before())?,
            not_after: to_utc(cert.not_after())?,
            serial_number: cert.serial_number().to_bn()?.to_dec_str()?.to_string(),
            subject_name: name_to_string(cert.subject_name()),
            issuer_name: name_to_string(cert.issuer_name()),
            raw_der: cert.to_der()?,
            public_key_der: cert.public_key()?.public_key_to_der()?,
        })
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CheckError> {
        let cert = X509::from_der(der)?;
        Self::from_x509(&cert)
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, CheckError> {
        let cert = X509::from_pem(pem)?;
        Self::from_x509(&cert)
    }

    /// True when `hostname` is the subject CN or one of the DNS SANs.
    ///
    /// Comparison is exact: no case folding, no wildcard expansion.
    pub fn matches_hostname(&self, hostname: &str) -> bool {
        self.subject_common_name.as_deref() == Some(hostname)
            || self.subject_alt_names.iter().any(|name| name == hostname)
    }
}

fn to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, CheckError> {
    let diff = Asn1Time::from_unix(0)?.diff(time)?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| CheckError::InvalidCertificate {
            reason: format!("validity date {time} out of range"),
        })
}

fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry.data().to_string().unwrap_or_default();
            format!("/{key}={value}")
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod testing {
    //! Self-signed certificates built on the fly.

    use openssl::asn1::{Asn1Integer, Asn1Time};
    use openssl::bn::BigNum;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::x509::extension::SubjectAlternativeName;
    use openssl::x509::{X509NameBuilder, X509};

    pub(crate) fn key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    /// Certificate valid from `not_before` to `not_after` (unix seconds).
    pub(crate) fn certificate(
        key: &PKey<Private>,
        cn: Option<&str>,
        sans: &[&str],
        not_before: i64,
        not_after: i64,
    ) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("O", "Example Org").unwrap();
        if let Some(cn) = cn {
            name.append_entry_by_text("CN", cn).unwrap();
        }
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = Asn1Integer::from_bn(&BigNum::from_u32(4242).unwrap()).unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&Asn1Time::from_unix(not_before).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::from_unix(not_after).unwrap())
            .unwrap();
        if !sans.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for name in sans {
                san.dns(name);
            }
            san.email("hostmaster@example.com");
            let extension = san.build(&builder.x509v3_context(None, None)).unwrap();
            builder.append_extension(extension).unwrap();
        }
        builder.sign(key, MessageDigest::sha256()).unwrap();
        builder.build()
    }
}
