//! Response-header model and the content-policy equivalence class

/// Canonical name of the single policy header left on every response.
pub const POLICY_HEADER: &str = "Content-Security-Policy";

const ENFORCING: &str = "content-security-policy";
const REPORT_ONLY: &str = "content-security-policy-report-only";

/// The permissive policy substituted for whatever the response carried.
/// Inline and dynamic script/style stay runnable and every fetch class may
/// reach any origin.
pub const REPLACEMENT_POLICY: &str = "default-src * 'unsafe-inline' 'unsafe-eval' data: blob:; \
     script-src * 'unsafe-inline' 'unsafe-eval' data: blob:; \
     style-src * 'unsafe-inline' data: blob:; \
     img-src * data: blob:; \
     font-src * data: blob:; \
     connect-src * data: blob: ws: wss:; \
     media-src * data: blob:; \
     frame-src * data: blob:; \
     worker-src * data: blob:; \
     frame-ancestors *";

/// Whether a header name is any case variant of the policy header,
/// enforcing or report-only.
pub fn is_policy_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(ENFORCING) || name.eq_ignore_ascii_case(REPORT_ONLY)
}

/// Case-preserving, insertion-ordered response header set, the shape the
/// host's interception facility hands over. Multiple values may exist under
/// one name, and the same logical header may appear under several spellings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    entries: Vec<(String, Vec<String>)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping the given spelling distinct from other
    /// spellings of the same logical header.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some((_, values)) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            values.push(value);
        } else {
            self.entries.push((name, vec![value]));
        }
    }

    /// Replace every spelling of the name with a single entry.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.entries.push((name, vec![value.into()]));
    }

    /// Drop every entry whose name the predicate matches; returns how many
    /// entries were removed.
    pub fn remove_matching(&mut self, matches: impl Fn(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(name, _)| !matches(name));
        before - self.entries.len()
    }

    /// All values stored under any spelling of the name.
    pub fn values(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .flat_map(|(_, values)| values.iter().map(String::as_str))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for ResponseHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}
