use crate::config::{ClusteringConfig, ScoringPolicy};
use crate::domain::{GymEntity, SourceAttribution};
use crate::types::RawListing;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Merges raw listings across providers into canonical entities with
/// confidence scores. Clustering is transitive (union-find): a chain
/// A-B-C groups into one cluster even if A and C alone fall below the
/// match threshold.
pub struct Reconciler {
    scoring: ScoringPolicy,
    clustering: ClusteringConfig,
}

/// Union-find over listing indices
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Normalize a business name for consistent matching
pub fn normalize_name(name: &str) -> String {
    let lowered = name
        .to_lowercase()
        .replace('&', "and")
        .replace(['-', '_', ',', '.', '\''], " ");
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Calculate string similarity using Levenshtein distance
pub fn levenshtein_similarity(s1: &str, s2: &str) -> f64 {
    if s1 == s2 {
        return 1.0;
    }

    let len1 = s1.chars().count();
    let len2 = s2.chars().count();

    if len1 == 0 || len2 == 0 {
        return 0.0;
    }

    let max_len = len1.max(len2);
    let distance = levenshtein_distance(s1, s2);

    1.0 - (distance as f64 / max_len as f64)
}

fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let chars1: Vec<char> = s1.chars().collect();
    let chars2: Vec<char> = s2.chars().collect();
    let len1 = chars1.len();
    let len2 = chars2.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if chars1[i - 1] == chars2[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

/// Token-overlap similarity (Jaccard) on normalized names
fn token_similarity(n1: &str, n2: &str) -> f64 {
    let tokens1: std::collections::HashSet<&str> = n1.split_whitespace().collect();
    let tokens2: std::collections::HashSet<&str> = n2.split_whitespace().collect();

    if tokens1.is_empty() && tokens2.is_empty() {
        return 1.0;
    }

    let intersection = tokens1.intersection(&tokens2).count();
    let union = tokens1.union(&tokens2).count();

    intersection as f64 / union as f64
}

/// Name similarity used for matching: the stronger of edit-distance and
/// token-overlap similarity on normalized names.
pub fn name_similarity(name1: &str, name2: &str) -> f64 {
    let n1 = normalize_name(name1);
    let n2 = normalize_name(name2);
    if n1 == n2 {
        return 1.0;
    }
    levenshtein_similarity(&n1, &n2).max(token_similarity(&n1, &n2))
}

/// Canonical confidence from per-source confidences: noisy-or combination.
/// Multi-provider corroboration compounds, so two independent agreeing
/// providers always score above either provider alone; single-source
/// entities are additionally capped.
pub fn combine_confidence(sources: &[SourceAttribution], policy: &ScoringPolicy) -> f64 {
    let product: f64 = sources
        .iter()
        .map(|s| 1.0 - s.per_source_confidence.clamp(0.0, 1.0))
        .product();
    let combined = 1.0 - product;

    if sources.len() <= 1 {
        combined.min(policy.single_source_cap)
    } else {
        combined.min(1.0)
    }
}

impl Reconciler {
    pub fn new(scoring: ScoringPolicy, clustering: ClusteringConfig) -> Self {
        Self { scoring, clustering }
    }

    /// Merge raw listings into canonical entities for one searched location
    pub fn reconcile(&self, listings: &[RawListing], location_key: &str) -> Vec<GymEntity> {
        if listings.is_empty() {
            return Vec::new();
        }

        let clusters = self.cluster(listings);
        info!(
            "Clustered {} raw listings into {} candidate entities for '{}'",
            listings.len(),
            clusters.len(),
            location_key
        );

        clusters
            .into_iter()
            .map(|cluster| self.canonicalize(&cluster, listings, location_key))
            .collect()
    }

    /// Combined name/proximity similarity for a listing pair.
    /// Zero when either component disqualifies the pair outright.
    pub fn pair_similarity(&self, a: &RawListing, b: &RawListing) -> f64 {
        let distance = a.coordinates.haversine_distance_meters(&b.coordinates);
        if distance > self.clustering.max_match_distance_meters {
            return 0.0;
        }

        let name_score = name_similarity(&a.name, &b.name);
        if name_score < self.clustering.name_similarity_floor {
            return 0.0;
        }

        let proximity_score = 1.0 - (distance / self.clustering.max_match_distance_meters);

        self.clustering.name_weight * name_score + self.clustering.distance_weight * proximity_score
    }

    /// Group listings into transitive clusters of probable same-business pairs
    fn cluster(&self, listings: &[RawListing]) -> Vec<Vec<usize>> {
        let mut set = DisjointSet::new(listings.len());

        for i in 0..listings.len() {
            for j in (i + 1)..listings.len() {
                // Listings from one provider are distinct businesses by
                // that provider's own dedup; only cross-provider pairs merge.
                if listings[i].provider_name == listings[j].provider_name {
                    continue;
                }
                let similarity = self.pair_similarity(&listings[i], &listings[j]);
                if similarity >= self.clustering.match_threshold {
                    debug!(
                        "Matched '{}' ({}) with '{}' ({}) at similarity {:.3}",
                        listings[i].name,
                        listings[i].provider_name,
                        listings[j].name,
                        listings[j].provider_name,
                        similarity
                    );
                    set.union(i, j);
                }
            }
        }

        let mut clusters: std::collections::HashMap<usize, Vec<usize>> =
            std::collections::HashMap::new();
        for idx in 0..listings.len() {
            clusters.entry(set.find(idx)).or_default().push(idx);
        }

        let mut result: Vec<Vec<usize>> = clusters.into_values().collect();
        // Deterministic output order for stable results and tests
        result.sort_by_key(|c| c[0]);
        result
    }

    /// Per-source confidence: provider reliability prior scaled by
    /// completeness of the record.
    pub fn per_source_confidence(&self, listing: &RawListing) -> f64 {
        let reliability = self.scoring.reliability(&listing.provider_name);
        let score = reliability
            * (self.scoring.base_confidence
                + self.scoring.completeness_weight * listing.completeness());
        score.clamp(0.0, 1.0)
    }

    /// Build the canonical entity for one cluster: the highest-priority,
    /// most complete member supplies core fields, other members fill gaps.
    fn canonicalize(
        &self,
        cluster: &[usize],
        listings: &[RawListing],
        location_key: &str,
    ) -> GymEntity {
        let mut members: Vec<&RawListing> = cluster.iter().map(|&i| &listings[i]).collect();
        members.sort_by(|a, b| {
            self.scoring
                .priority_rank(&a.provider_name)
                .cmp(&self.scoring.priority_rank(&b.provider_name))
                .then(
                    b.completeness()
                        .partial_cmp(&a.completeness())
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        let primary = members[0];
        let now = Utc::now();

        // One attribution per provider; when a provider contributed several
        // cluster members the most complete one already sorted first.
        let mut sources: Vec<SourceAttribution> = Vec::new();
        for member in &members {
            if sources.iter().any(|s| s.provider_name == member.provider_name) {
                continue;
            }
            sources.push(SourceAttribution {
                provider_name: member.provider_name.clone(),
                per_source_confidence: self.per_source_confidence(member),
                last_updated: now,
            });
        }

        let match_confidence = self.cluster_match_confidence(&members);
        let confidence = combine_confidence(&sources, &self.scoring);

        if match_confidence < self.clustering.match_threshold && members.len() > 1 {
            warn!(
                "Cluster for '{}' has internally weak agreement ({:.3}); emitting with low match confidence",
                primary.name, match_confidence
            );
        }

        GymEntity {
            id: None,
            name: primary.name.clone(),
            address: primary.address.clone(),
            coordinates: primary.coordinates,
            phone: Self::fill_field(&members, |m| m.phone.clone()),
            website: Self::fill_field(&members, |m| m.website.clone()),
            instagram: None,
            rating: Self::fill_field(&members, |m| m.rating),
            review_count: Self::fill_field(&members, |m| m.review_count),
            sources,
            confidence,
            match_confidence,
            source_location: location_key.to_string(),
            metropolitan_area_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// First populated value in priority order
    fn fill_field<T, F>(members: &[&RawListing], extract: F) -> Option<T>
    where
        F: Fn(&RawListing) -> Option<T>,
    {
        members.iter().find_map(|m| extract(m))
    }

    /// How certain the clustering step was that the grouped listings refer
    /// to the same real-world business: mean pairwise similarity across the
    /// cluster. Contradictory members drag this down without dropping the
    /// entity; singletons get a fixed neutral value.
    fn cluster_match_confidence(&self, members: &[&RawListing]) -> f64 {
        if members.len() < 2 {
            return self.scoring.singleton_match_confidence;
        }

        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                total += self.pair_similarity(members[i], members[j]);
                pairs += 1;
            }
        }

        total / pairs as f64
    }
}
