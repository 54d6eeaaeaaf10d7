//! Pure operations over [`Profile`]. Nothing here mutates in place; every
//! update returns a new value.

use crate::catalog::field_config;
use crate::errors::AppError;
use crate::models::{Profile, ProfileField};
use crate::value_mapper::{snap_lounge_visits, to_display};

/// Lounge fields only hold one of the offered choices; other fields keep
/// the value as given.
pub fn accepted_value(field: ProfileField, value: u64) -> u64 {
    if field.is_lounge() {
        snap_lounge_visits(value)
    } else {
        value
    }
}

/// Returns a copy of `profile` with `field` replaced by `value`.
pub fn set_field(profile: &Profile, field: ProfileField, value: u64) -> Profile {
    let mut next = *profile;
    *next.slot_mut(field) = value;
    next
}

/// Maps a slider position through the field's maximum and stores the result.
pub fn set_field_from_slider(
    profile: &Profile,
    field: ProfileField,
    ui_position: u32,
) -> Result<Profile, AppError> {
    let value = to_display(ui_position, field_config(field).max)?;
    Ok(set_field(profile, field, accepted_value(field, value)))
}

/// True iff any of `fields` is non-zero.
pub fn has_category_data(profile: &Profile, fields: &[ProfileField]) -> bool {
    fields.iter().any(|field| profile.get(*field) > 0)
}

pub fn fields(profile: &Profile) -> impl Iterator<Item = (ProfileField, u64)> + '_ {
    ProfileField::ALL
        .into_iter()
        .map(move |field| (field, profile.get(field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_field_returns_new_value() {
        let original = Profile::default();
        let updated = set_field(&original, ProfileField::Rent, 25_000);

        assert_eq!(original.rent, 0);
        assert_eq!(updated.rent, 25_000);
        assert_eq!(updated.get(ProfileField::Rent), 25_000);
    }

    #[test]
    fn test_has_category_data() {
        let profile = set_field(&Profile::default(), ProfileField::WaterBills, 300);
        let bills = [
            ProfileField::MobilePhoneBills,
            ProfileField::ElectricityBills,
            ProfileField::WaterBills,
        ];

        assert!(has_category_data(&profile, &bills));
        assert!(!has_category_data(&profile, &[ProfileField::Rent]));
        assert!(!has_category_data(&profile, &[]));
    }

    #[test]
    fn test_set_field_from_slider_uses_field_max() {
        let profile =
            set_field_from_slider(&Profile::default(), ProfileField::FlightsAnnual, 100).unwrap();
        assert_eq!(profile.flights_annual, 500_000);

        let profile = set_field_from_slider(
            &Profile::default(),
            ProfileField::DomesticLoungeUsageQuarterly,
            100,
        )
        .unwrap();
        assert_eq!(profile.domestic_lounge_usage_quarterly, 8);
    }

    #[test]
    fn test_accepted_value_snaps_lounge_fields_only() {
        assert_eq!(accepted_value(ProfileField::DomesticLoungeUsageQuarterly, 3), 2);
        assert_eq!(accepted_value(ProfileField::InternationalLoungeUsageQuarterly, 12), 8);
        assert_eq!(accepted_value(ProfileField::Rent, 3), 3);
    }

    #[test]
    fn test_fields_iterates_all() {
        let profile = set_field(&Profile::default(), ProfileField::Fuel, 4_000);
        let non_zero: Vec<_> = fields(&profile).filter(|(_, v)| *v > 0).collect();

        assert_eq!(fields(&profile).count(), 19);
        assert_eq!(non_zero, vec![(ProfileField::Fuel, 4_000)]);
    }
}
