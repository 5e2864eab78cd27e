//! Mail server discovery from email domains.
//!
//! Lead inboxes live on ordinary consumer or hosted mail providers. This module maps an
//! account's domain to the IMAP host used for reading and the SMTP submission endpoint
//! used for sending results, with support for runtime customization.
//!
//! # Example
//!
//! ```
//! use lead_triage::known_servers::{ServerRegistry, SmtpSecurity, discover_servers};
//!
//! let servers = discover_servers("agent@gmail.com");
//! assert_eq!(servers.imap_host, "imap.gmail.com");
//! assert_eq!(servers.smtp_host, "smtp.gmail.com");
//!
//! let mut registry = ServerRegistry::with_defaults();
//! registry.register("brokerage.com", "mail.brokerage.com", "mail.brokerage.com", SmtpSecurity::StartTls);
//! assert_eq!(registry.discover("agent@brokerage.com").smtp_security, SmtpSecurity::StartTls);
//! ```

use std::collections::HashMap;
use std::sync::LazyLock;

/// How the SMTP submission connection is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmtpSecurity {
    /// TLS from the first byte (submissions over port 465).
    #[default]
    ImplicitTls,
    /// Plain connection upgraded with STARTTLS (port 587).
    StartTls,
}

impl SmtpSecurity {
    /// Conventional submission port for this security mode.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            SmtpSecurity::ImplicitTls => 465,
            SmtpSecurity::StartTls => 587,
        }
    }
}

/// Resolved read/send endpoints for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailServers {
    /// IMAP server hostname.
    pub imap_host: String,
    /// SMTP submission hostname.
    pub smtp_host: String,
    /// How the SMTP connection is secured.
    pub smtp_security: SmtpSecurity,
}

#[derive(Debug, Clone)]
struct Entry {
    imap_host: String,
    smtp_host: String,
    smtp_security: SmtpSecurity,
}

impl Entry {
    fn to_servers(&self) -> MailServers {
        MailServers {
            imap_host: self.imap_host.clone(),
            smtp_host: self.smtp_host.clone(),
            smtp_security: self.smtp_security,
        }
    }
}

/// Map of email domains to `(imap host, smtp host, smtp security)`.
static KNOWN_SERVERS: LazyLock<HashMap<&'static str, (&'static str, &'static str, SmtpSecurity)>> =
    LazyLock::new(|| {
        use SmtpSecurity::{ImplicitTls, StartTls};

        let mut m = HashMap::new();

        // Google
        m.insert("gmail.com", ("imap.gmail.com", "smtp.gmail.com", ImplicitTls));
        m.insert("googlemail.com", ("imap.gmail.com", "smtp.gmail.com", ImplicitTls));

        // Yahoo / AOL
        m.insert("yahoo.com", ("imap.mail.yahoo.com", "smtp.mail.yahoo.com", ImplicitTls));
        m.insert("aol.com", ("imap.aol.com", "smtp.aol.com", ImplicitTls));

        // Microsoft
        for domain in ["hotmail.com", "outlook.com", "live.com", "msn.com"] {
            m.insert(domain, ("outlook.office365.com", "smtp-mail.outlook.com", StartTls));
        }

        // Apple
        for domain in ["icloud.com", "me.com", "mac.com"] {
            m.insert(domain, ("imap.mail.me.com", "smtp.mail.me.com", StartTls));
        }

        // US ISPs
        m.insert("comcast.net", ("imap.comcast.net", "smtp.comcast.net", StartTls));
        m.insert("att.net", ("imap.mail.att.net", "smtp.mail.att.net", ImplicitTls));

        // Hosted
        m.insert("fastmail.com", ("imap.fastmail.com", "smtp.fastmail.com", ImplicitTls));
        m.insert("zoho.com", ("imap.zoho.com", "smtp.zoho.com", ImplicitTls));

        m
    });

fn domain_of(email: &str) -> String {
    email.split('@').nth(1).unwrap_or(email).to_lowercase()
}

fn fallback(domain: &str) -> MailServers {
    MailServers {
        imap_host: format!("imap.{domain}"),
        smtp_host: format!("smtp.{domain}"),
        smtp_security: SmtpSecurity::default(),
    }
}

fn builtin(domain: &str) -> Option<MailServers> {
    KNOWN_SERVERS
        .get(domain)
        .map(|&(imap, smtp, security)| MailServers {
            imap_host: imap.to_string(),
            smtp_host: smtp.to_string(),
            smtp_security: security,
        })
}

/// A customizable registry for mail server discovery.
///
/// Custom mappings take precedence over the built-in table, which is consulted only
/// when the registry was created with [`Self::with_defaults`].
#[derive(Debug, Clone, Default)]
pub struct ServerRegistry {
    custom: HashMap<String, Entry>,
    use_defaults: bool,
}

impl ServerRegistry {
    /// Creates an empty registry without built-in defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that includes built-in default mappings.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            custom: HashMap::new(),
            use_defaults: true,
        }
    }

    /// Registers a custom domain mapping, overriding any existing one.
    pub fn register(
        &mut self,
        domain: impl Into<String>,
        imap_host: impl Into<String>,
        smtp_host: impl Into<String>,
        smtp_security: SmtpSecurity,
    ) {
        self.custom.insert(
            domain.into().to_lowercase(),
            Entry {
                imap_host: imap_host.into(),
                smtp_host: smtp_host.into(),
                smtp_security,
            },
        );
    }

    /// Removes a custom mapping. Built-in defaults are unaffected.
    pub fn unregister(&mut self, domain: &str) -> Option<MailServers> {
        self.custom
            .remove(&domain.to_lowercase())
            .map(|entry| entry.to_servers())
    }

    /// Discovers the mail servers for an email address.
    ///
    /// Resolution order:
    /// 1. Custom mappings (added via [`Self::register`])
    /// 2. Built-in defaults (if [`Self::with_defaults`] was used)
    /// 3. Fallback to `imap.{domain}` / `smtp.{domain}` with implicit TLS
    #[must_use]
    pub fn discover(&self, email: &str) -> MailServers {
        let domain = domain_of(email);

        if let Some(entry) = self.custom.get(&domain) {
            return entry.to_servers();
        }

        if self.use_defaults {
            if let Some(servers) = builtin(&domain) {
                return servers;
            }
        }

        fallback(&domain)
    }

    /// Returns `true` if the domain has a known mapping.
    #[must_use]
    pub fn is_known(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        self.custom.contains_key(&domain)
            || (self.use_defaults && KNOWN_SERVERS.contains_key(domain.as_str()))
    }
}

/// Discovers mail servers for an email address using the built-in table only.
///
/// ```
/// use lead_triage::known_servers::discover_servers;
///
/// assert_eq!(discover_servers("user@custom.org").imap_host, "imap.custom.org");
/// ```
#[must_use]
pub fn discover_servers(email: &str) -> MailServers {
    let domain = domain_of(email);
    builtin(&domain).unwrap_or_else(|| fallback(&domain))
}
