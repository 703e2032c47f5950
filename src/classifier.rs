/// Category classification and proposal matching
///
/// A pure rule lookup over keyword tables supplied in [`ClassifierConfig`].
/// Every table is an ordered list so precedence never depends on map
/// iteration order.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::models::Lead;

// ============ Labels ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Government,
    University,
    School,
    Corporate,
}

impl OrganizationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationType::Government => "government",
            OrganizationType::University => "university",
            OrganizationType::School => "school",
            OrganizationType::Corporate => "corporate",
        }
    }
}

impl fmt::Display for OrganizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outreach urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    High,
    Medium,
    Low,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::High => "high",
            PriorityTier::Medium => "medium",
            PriorityTier::Low => "low",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriorityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "high_priority" => Ok(PriorityTier::High),
            "medium" | "medium_priority" => Ok(PriorityTier::Medium),
            "low" | "low_priority" => Ok(PriorityTier::Low),
            other => Err(format!("Unknown priority tier: {}", other)),
        }
    }
}

// ============ Configuration ============

/// One label with the phrases that select it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule<T> {
    pub label: T,
    pub keywords: Vec<String>,
}

/// A proposal package and its per-organization documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Document sent when no organization-specific variant exists.
    pub document: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub variants: BTreeMap<OrganizationType, String>,
}

/// Outreach settings attached to a priority tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierStrategy {
    pub template: String,
    pub proposal_level: String,
    pub follow_up_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationBoost {
    pub location: String,
    pub boost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightRule {
    pub keywords: Vec<String>,
    pub insight: String,
}

/// Keyword tables and outreach settings, in precedence order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub organization_types: Vec<KeywordRule<OrganizationType>>,
    pub default_organization_type: OrganizationType,
    pub priority_tiers: Vec<KeywordRule<PriorityTier>>,
    pub default_priority_tier: PriorityTier,
    pub packages: Vec<PackageRule>,
    pub default_package: String,
    pub tier_strategies: BTreeMap<PriorityTier, TierStrategy>,
    #[serde(default)]
    pub location_boosts: Vec<LocationBoost>,
    #[serde(default)]
    pub industry_insights: Vec<InsightRule>,
    #[serde(default)]
    pub default_insight: String,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let organization_types = vec![
            KeywordRule {
                label: OrganizationType::Government,
                keywords: words(&[
                    "ministry", "department", "jabatan", "kementerian", "government", "gov",
                    "govt", "pejabat", "suruhanjaya", "council", "authority", "board",
                    "commission", "public sector", "majlis", "agensi", "federal",
                ]),
            },
            KeywordRule {
                label: OrganizationType::University,
                keywords: words(&[
                    "university", "universiti", "college", "kolej", "institute", "institut",
                    "campus", "faculty", "school of", "academic", "higher education",
                    "graduate school", "polytechnic", "politeknik", "research center",
                ]),
            },
            KeywordRule {
                label: OrganizationType::School,
                keywords: words(&[
                    "school", "sekolah", "academy", "akademi", "primary school",
                    "secondary school", "high school", "middle school", "elementary",
                    "kindergarten", "tadika", "preschool", "education center",
                ]),
            },
            KeywordRule {
                label: OrganizationType::Corporate,
                keywords: words(&[
                    "sdn bhd", "berhad", "limited", "llc", "inc", "corporation", "corp",
                    "pte ltd", "private limited", "enterprise", "company", "consulting",
                    "agency", "firm", "partners", "associates", "group",
                ]),
            },
        ];

        let priority_tiers = vec![
            KeywordRule {
                label: PriorityTier::High,
                keywords: words(&[
                    "software development", "app development", "web development",
                    "digital agency", "it services", "information technology", "technology",
                    "tech startup", "digital marketing", "artificial intelligence",
                    "data analytics", "business consulting", "management consulting",
                    "consulting",
                ]),
            },
            KeywordRule {
                label: PriorityTier::Medium,
                keywords: words(&[
                    "marketing agency", "advertising agency", "financial services",
                    "accounting", "legal services", "recruitment", "human resources",
                    "education", "training center", "university", "college",
                    "event management", "event planner", "e commerce", "manufacturing",
                    "engineering", "construction", "architecture",
                ]),
            },
            KeywordRule {
                label: PriorityTier::Low,
                keywords: words(&[
                    "school", "tutoring", "language center", "hotel", "resort", "restaurant",
                    "catering", "retail", "wholesale", "shopping mall", "healthcare",
                    "medical", "fitness", "spa", "wellness",
                ]),
            },
        ];

        let packages = vec![
            PackageRule {
                name: "seminar".into(),
                description: "Seminar package with accommodation options".into(),
                document: "seminar corp package.pdf".into(),
                keywords: words(&[
                    "retreat", "workshop", "seminar", "offsite", "residential", "overnight",
                    "accommodation", "stay", "corporate retreat", "team building",
                ]),
                variants: BTreeMap::from([
                    (OrganizationType::Corporate, "seminar corp package.pdf".into()),
                    (OrganizationType::Government, "seminar gov package.pdf".into()),
                ]),
            },
            PackageRule {
                name: "meeting".into(),
                description: "Day meeting package without accommodation".into(),
                document: "meeting corp package.pdf".into(),
                keywords: words(&[
                    "meeting", "conference", "day event", "business meeting", "boardroom",
                    "day seminar", "presentation", "training session", "client meeting",
                    "executive",
                ]),
                variants: BTreeMap::from([
                    (OrganizationType::Corporate, "meeting corp package.pdf".into()),
                    (OrganizationType::Government, "meeting gov package.pdf".into()),
                ]),
            },
            PackageRule {
                name: "camping".into(),
                description: "Outdoor camping and adventure package".into(),
                document: "camping package.pdf".into(),
                keywords: words(&[
                    "camping", "outdoor", "adventure", "team building", "nature", "retreat",
                    "field trip", "expedition", "outdoor activities", "student camp",
                    "youth program",
                ]),
                variants: [
                    OrganizationType::Corporate,
                    OrganizationType::University,
                    OrganizationType::Government,
                    OrganizationType::School,
                ]
                .into_iter()
                .map(|t| (t, "camping package.pdf".to_string()))
                .collect(),
            },
            PackageRule {
                name: "wedding".into(),
                description: "Wedding and celebration package".into(),
                document: "wedding package.pdf".into(),
                keywords: words(&[
                    "wedding", "celebration", "ceremony", "reception", "event", "party",
                    "banquet", "gala", "anniversary", "special occasion", "formal dinner",
                ]),
                variants: [
                    OrganizationType::Corporate,
                    OrganizationType::University,
                    OrganizationType::Government,
                    OrganizationType::School,
                ]
                .into_iter()
                .map(|t| (t, "wedding package.pdf".to_string()))
                .collect(),
            },
        ];

        let tier_strategies = BTreeMap::from([
            (
                PriorityTier::High,
                TierStrategy {
                    template: "exec_tone".into(),
                    proposal_level: "premium".into(),
                    follow_up_days: 3,
                },
            ),
            (
                PriorityTier::Medium,
                TierStrategy {
                    template: "default".into(),
                    proposal_level: "standard".into(),
                    follow_up_days: 5,
                },
            ),
            (
                PriorityTier::Low,
                TierStrategy {
                    template: "default".into(),
                    proposal_level: "basic".into(),
                    follow_up_days: 7,
                },
            ),
        ]);

        let location_boosts = [
            ("Kuala Lumpur", 1.0),
            ("Petaling Jaya", 1.0),
            ("Cyberjaya", 1.0),
            ("Shah Alam", 0.5),
            ("Penang", 0.5),
            ("Johor Bahru", 0.5),
            ("Selangor", 0.5),
        ]
        .into_iter()
        .map(|(location, boost)| LocationBoost {
            location: location.into(),
            boost,
        })
        .collect();

        let industry_insights = vec![
            InsightRule {
                keywords: words(&["software", "technology", "digital"]),
                insight: "Technology businesses look for efficiency, scale and security.".into(),
            },
            InsightRule {
                keywords: words(&["consulting", "management"]),
                insight: "Consulting firms value client management and presentation quality."
                    .into(),
            },
            InsightRule {
                keywords: words(&["marketing", "advertising"]),
                insight: "Agencies want streamlined campaigns and clear reporting.".into(),
            },
            InsightRule {
                keywords: words(&["education", "training", "university", "school"]),
                insight: "Education providers care about learning outcomes and engagement."
                    .into(),
            },
            InsightRule {
                keywords: words(&["event"]),
                insight: "Event companies need scheduling and logistics support.".into(),
            },
        ];

        Self {
            organization_types,
            default_organization_type: OrganizationType::Corporate,
            priority_tiers,
            default_priority_tier: PriorityTier::Low,
            packages,
            default_package: "meeting".into(),
            tier_strategies,
            location_boosts,
            industry_insights,
            default_insight:
                "Most businesses benefit from better operational efficiency and customer engagement."
                    .into(),
        }
    }
}

impl ClassifierConfig {
    /// Loads a config from a JSON file and validates it.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading classifier config {}", path.display()))?;
        let config: ClassifierConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing classifier config {}", path.display()))?;
        config.validate().map_err(anyhow::Error::msg)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.packages.iter().any(|p| p.name == self.default_package) {
            return Err(format!(
                "default_package '{}' is not a configured package",
                self.default_package
            ));
        }
        for tier in [PriorityTier::High, PriorityTier::Medium, PriorityTier::Low] {
            if !self.tier_strategies.contains_key(&tier) {
                return Err(format!("tier_strategies is missing '{}'", tier));
            }
        }
        Ok(())
    }
}

// ============ Outputs ============

/// The document to attach for a package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalVariant {
    pub package: String,
    /// `None` when the package's bare default document was used.
    pub organization_type: Option<OrganizationType>,
    pub document: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub priority_tier: PriorityTier,
    pub organization_type: OrganizationType,
    pub recommended_package: String,
    pub recommended_variant: ProposalVariant,
}

/// Outreach plan derived from a classification and the lead's location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetingStrategy {
    pub tier: PriorityTier,
    pub template: String,
    pub proposal_level: String,
    pub follow_up_days: u32,
    pub location_boost: f64,
    pub industry_insights: String,
}

// ============ Classifier ============

/// Lower-cased, punctuation replaced by spaces, padded so `contains(" kw ")`
/// only matches whole phrases.
fn phrase_text(s: &str) -> String {
    let cleaned: String = s
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    format!(" {} ", cleaned.split_whitespace().collect::<Vec<_>>().join(" "))
}

#[derive(Debug, Clone)]
struct CompiledRule<T> {
    label: T,
    phrases: Vec<String>,
}

impl<T: Copy> CompiledRule<T> {
    fn compile(rule: &KeywordRule<T>) -> Self {
        Self {
            label: rule.label,
            phrases: compile_phrases(&rule.keywords),
        }
    }
}

fn compile_phrases(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| phrase_text(k))
        .filter(|p| !p.trim().is_empty())
        .collect()
}

fn hits(text: &str, phrases: &[String]) -> usize {
    phrases.iter().filter(|p| text.contains(p.as_str())).count()
}

/// Keyword classifier built once from a [`ClassifierConfig`].
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    organization_types: Vec<CompiledRule<OrganizationType>>,
    priority_tiers: Vec<CompiledRule<PriorityTier>>,
    packages: Vec<Vec<String>>,
    insights: Vec<Vec<String>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let organization_types = config
            .organization_types
            .iter()
            .map(CompiledRule::compile)
            .collect();
        let priority_tiers = config
            .priority_tiers
            .iter()
            .map(CompiledRule::compile)
            .collect();
        let packages = config
            .packages
            .iter()
            .map(|p| compile_phrases(&p.keywords))
            .collect();
        let insights = config
            .industry_insights
            .iter()
            .map(|r| compile_phrases(&r.keywords))
            .collect();

        Self {
            config,
            organization_types,
            priority_tiers,
            packages,
            insights,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Organization type from name, category and source URLs; first rule wins.
    pub fn organization_type(&self, lead: &Lead) -> OrganizationType {
        let mut text = String::new();
        text.push_str(&lead.organization_name);
        text.push(' ');
        text.push_str(lead.category.as_deref().unwrap_or(""));
        for url in lead.website.iter().cloned().chain(lead.source_urls()) {
            text.push(' ');
            text.push_str(&url);
        }
        let text = phrase_text(&text);

        self.organization_types
            .iter()
            .find(|rule| hits(&text, &rule.phrases) > 0)
            .map(|rule| rule.label)
            .unwrap_or(self.config.default_organization_type)
    }

    /// Priority tier from the category alone; first rule wins.
    pub fn priority_tier(&self, category: Option<&str>) -> PriorityTier {
        let text = phrase_text(category.unwrap_or(""));
        self.priority_tiers
            .iter()
            .find(|rule| hits(&text, &rule.phrases) > 0)
            .map(|rule| rule.label)
            .unwrap_or(self.config.default_priority_tier)
    }

    /// Package with the most keyword hits; ties go to the earlier package.
    pub fn package(&self, lead: &Lead) -> &PackageRule {
        let mut text = String::new();
        for part in [
            lead.category.as_deref(),
            Some(lead.organization_name.as_str()),
            lead.role.as_deref(),
            lead.website.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            text.push_str(part);
            text.push(' ');
        }
        for url in lead.source_urls() {
            text.push_str(&url);
            text.push(' ');
        }
        let text = phrase_text(&text);

        let mut best: Option<(usize, usize)> = None;
        for (i, phrases) in self.packages.iter().enumerate() {
            let count = hits(&text, phrases);
            if count > 0 && best.map_or(true, |(_, top)| count > top) {
                best = Some((i, count));
            }
        }

        match best {
            Some((i, _)) => &self.config.packages[i],
            None => self.default_package(),
        }
    }

    fn default_package(&self) -> &PackageRule {
        self.config
            .packages
            .iter()
            .find(|p| p.name == self.config.default_package)
            .or_else(|| self.config.packages.first())
            .unwrap_or(&*FALLBACK_PACKAGE)
    }

    /// Document for `package`, specialised for `organization_type` when a variant exists.
    pub fn variant(package: &PackageRule, organization_type: OrganizationType) -> ProposalVariant {
        match package.variants.get(&organization_type) {
            Some(document) => ProposalVariant {
                package: package.name.clone(),
                organization_type: Some(organization_type),
                document: document.clone(),
            },
            None => ProposalVariant {
                package: package.name.clone(),
                organization_type: None,
                document: package.document.clone(),
            },
        }
    }

    pub fn classify(&self, lead: &Lead) -> Classification {
        let organization_type = self.organization_type(lead);
        let priority_tier = self.priority_tier(lead.category.as_deref());
        let package = self.package(lead);
        let recommended_variant = Self::variant(package, organization_type);

        Classification {
            priority_tier,
            organization_type,
            recommended_package: package.name.clone(),
            recommended_variant,
        }
    }

    /// Outreach plan: the classified tier raised by location, plus tier settings.
    pub fn targeting(&self, lead: &Lead, classification: &Classification) -> TargetingStrategy {
        let city = lead
            .address
            .as_ref()
            .and_then(|a| a.city.as_deref())
            .unwrap_or("")
            .to_lowercase();
        let state = lead
            .address
            .as_ref()
            .and_then(|a| a.state.as_deref())
            .unwrap_or("")
            .to_lowercase();

        let location_boost = self
            .config
            .location_boosts
            .iter()
            .find(|b| {
                let needle = b.location.to_lowercase();
                city.contains(&needle) || state.contains(&needle)
            })
            .map(|b| b.boost)
            .unwrap_or(0.0);

        let tier = match classification.priority_tier {
            PriorityTier::Medium if location_boost >= 1.0 => PriorityTier::High,
            PriorityTier::Low if location_boost >= 0.5 => PriorityTier::Medium,
            tier => tier,
        };

        let (template, proposal_level, follow_up_days) = match self.config.tier_strategies.get(&tier)
        {
            Some(s) => (s.template.clone(), s.proposal_level.clone(), s.follow_up_days),
            None => ("default".to_string(), "basic".to_string(), 7),
        };

        let category = phrase_text(lead.category.as_deref().unwrap_or(""));
        let industry_insights = self
            .insights
            .iter()
            .position(|phrases| hits(&category, phrases) > 0)
            .map(|i| self.config.industry_insights[i].insight.clone())
            .unwrap_or_else(|| self.config.default_insight.clone());

        TargetingStrategy {
            tier,
            template,
            proposal_level,
            follow_up_days,
            location_boost,
            industry_insights,
        }
    }
}

static FALLBACK_PACKAGE: once_cell::sync::Lazy<PackageRule> =
    once_cell::sync::Lazy::new(|| PackageRule {
        name: "meeting".into(),
        description: String::new(),
        document: "meeting corp package.pdf".into(),
        keywords: Vec::new(),
        variants: BTreeMap::new(),
    });
