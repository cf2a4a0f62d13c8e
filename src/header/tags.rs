use num_derive::{FromPrimitive, ToPrimitive};
use strum_macros::Display;

/// Header tags a spec file can populate, numbered as in rpmtag.h.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive, Display)]
pub enum Tag {
    Name = 1000,
    Version = 1001,
    Release = 1002,
    Epoch = 1003,
    Summary = 1004,
    Description = 1005,
    Distribution = 1010,
    Vendor = 1011,
    License = 1014,
    Packager = 1015,
    Group = 1016,
    Source = 1018,
    Patch = 1019,
    Url = 1020,
    Os = 1021,
    Arch = 1022,
    ProvideName = 1047,
    RequireName = 1049,
    ConflictName = 1054,
    ExcludeArch = 1059,
    ExclusiveArch = 1061,
    BuildArchs = 1089,
    ObsoleteName = 1090,
    Prefixes = 1098,
    RecommendName = 5046,
    SuggestName = 5049,
}

const ALL_TAGS: [Tag; 26] = [
    Tag::Name,
    Tag::Version,
    Tag::Release,
    Tag::Epoch,
    Tag::Summary,
    Tag::Description,
    Tag::Distribution,
    Tag::Vendor,
    Tag::License,
    Tag::Packager,
    Tag::Group,
    Tag::Source,
    Tag::Patch,
    Tag::Url,
    Tag::Os,
    Tag::Arch,
    Tag::ProvideName,
    Tag::RequireName,
    Tag::ConflictName,
    Tag::ExcludeArch,
    Tag::ExclusiveArch,
    Tag::BuildArchs,
    Tag::ObsoleteName,
    Tag::Prefixes,
    Tag::RecommendName,
    Tag::SuggestName,
];

impl Tag {
    /// Looks a tag up by its query-format name, ignoring case.
    pub fn from_name(name: &str) -> Option<Tag> {
        let alias = match name.to_ascii_uppercase().as_str() {
            "PROVIDES" => Some(Tag::ProvideName),
            "REQUIRES" => Some(Tag::RequireName),
            "CONFLICTS" => Some(Tag::ConflictName),
            "OBSOLETES" => Some(Tag::ObsoleteName),
            _ => None,
        };

        alias.or_else(|| {
            ALL_TAGS
                .iter()
                .copied()
                .find(|tag| tag.to_string().eq_ignore_ascii_case(name))
        })
    }
}
