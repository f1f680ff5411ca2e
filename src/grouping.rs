//! Variant grouping (C4, spec.md §4.4).
//!
//! Partitions a family's flat list of [`VariantRecord`]s by color, in first-
//! seen order, and marks the first variant within each color group as that
//! color's primary (main-image) variant. Pure: no I/O, no hashing here.

use crate::normalize::VariantRecord;

#[derive(Debug, Clone)]
pub struct GroupedVariant {
    pub variant: VariantRecord,
    pub is_primary_for_color: bool,
}

/// Group variants by color (variants with no color are treated as their own
/// singleton group keyed on `None`), preserving the order colors first
/// appear in `variants` and the order variants appear within each color.
pub fn group_by_color(variants: Vec<VariantRecord>) -> Vec<GroupedVariant> {
    let mut seen_colors: Vec<Option<String>> = Vec::new();
    let mut grouped: Vec<GroupedVariant> = Vec::with_capacity(variants.len());

    for variant in variants {
        let is_first_for_color = !seen_colors.contains(&variant.color);
        if is_first_for_color {
            seen_colors.push(variant.color.clone());
        }
        grouped.push(GroupedVariant {
            variant,
            is_primary_for_color: is_first_for_color,
        });
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(sku: &str, color: Option<&str>) -> VariantRecord {
        VariantRecord {
            sku: sku.to_string(),
            color: color.map(str::to_string),
            hex_color: None,
            size: None,
            dimensions: Default::default(),
            diameter: None,
            primary_image: None,
            gallery_images: Vec::new(),
        }
    }

    #[test]
    fn first_variant_per_color_is_primary() {
        let variants = vec![
            variant("V1", Some("Red")),
            variant("V2", Some("Red")),
            variant("V3", Some("Blue")),
        ];
        let grouped = group_by_color(variants);
        assert!(grouped[0].is_primary_for_color);
        assert!(!grouped[1].is_primary_for_color);
        assert!(grouped[2].is_primary_for_color);
    }

    #[test]
    fn preserves_feed_order() {
        let variants = vec![
            variant("V1", Some("Blue")),
            variant("V2", Some("Red")),
            variant("V3", Some("Blue")),
        ];
        let grouped = group_by_color(variants);
        let skus: Vec<&str> = grouped.iter().map(|g| g.variant.sku.as_str()).collect();
        assert_eq!(skus, vec!["V1", "V2", "V3"]);
    }

    #[test]
    fn colorless_variants_are_each_their_own_group() {
        let variants = vec![variant("V1", None), variant("V2", None)];
        let grouped = group_by_color(variants);
        assert!(grouped[0].is_primary_for_color);
        assert!(!grouped[1].is_primary_for_color);
    }

    #[test]
    fn empty_list_yields_empty_groups() {
        assert!(group_by_color(Vec::new()).is_empty());
    }
}
