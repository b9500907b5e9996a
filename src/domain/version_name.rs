/// The three version strings allocated for a single module release.
///
/// The business version is the human-facing version without a build number
/// (e.g. `1.2`); the release version appends the build number (`1.2.7`) when
/// build numbers are in use, and is the business version alone otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionName {
    development_version: String,
    business_version: String,
    build_number: u64,
    use_build_number: bool,
}

impl VersionName {
    /// A version name that carries a build number
    pub fn new(
        development_version: impl Into<String>,
        business_version: impl Into<String>,
        build_number: u64,
    ) -> Self {
        VersionName {
            development_version: development_version.into(),
            business_version: business_version.into(),
            build_number,
            use_build_number: true,
        }
    }

    /// A version name whose release version is the business version itself
    pub fn without_build_number(
        development_version: impl Into<String>,
        business_version: impl Into<String>,
    ) -> Self {
        VersionName {
            development_version: development_version.into(),
            business_version: business_version.into(),
            build_number: 0,
            use_build_number: false,
        }
    }

    pub fn business_version(&self) -> &str {
        &self.business_version
    }

    pub fn development_version(&self) -> &str {
        &self.development_version
    }

    pub fn build_number(&self) -> u64 {
        self.build_number
    }

    pub fn uses_build_number(&self) -> bool {
        self.use_build_number
    }

    /// The version that is tagged and published
    pub fn release_version(&self) -> String {
        if self.use_build_number {
            format!("{}.{}", self.business_version, self.build_number)
        } else {
            self.business_version.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_version_appends_build_number() {
        let name = VersionName::new("1.3-SNAPSHOT", "1.2", 7);
        assert_eq!(name.release_version(), "1.2.7");
        assert_eq!(name.business_version(), "1.2");
        assert_eq!(name.development_version(), "1.3-SNAPSHOT");
        assert_eq!(name.build_number(), 7);
    }

    #[test]
    fn test_release_version_without_build_number() {
        let name = VersionName::without_build_number("1.3-SNAPSHOT", "1.2");
        assert_eq!(name.release_version(), "1.2");
        assert_eq!(name.build_number(), 0);
        assert!(!name.uses_build_number());
    }
}
