// ⚙️ Reconciliation Engine - keep the two catalogs aligned
//
// Depth-first, single pass, no backtracking. Every level runs the same step:
//
//   1. Normalize the source node's name
//   2. Scoped lookup in the target catalog
//   3. Found → attach the source id to the existing entity (link)
//      Not found → construct a draft with the sentinel id
//   4. Commit switch on → upsert (store assigns a real id)
//   5. Descent gate: id still 0 → stop, children would have a dangling
//      foreign key. A matched entity has a real id regardless of the switch,
//      so existing subtrees are always walked; only new branches are gated.
//
// Strictly sequential by design: a Vehicle upsert must not be issued before
// its Brand upsert returned the assigned id. The engine assumes it is the
// sole writer of the target catalog for the duration of a run; concurrent
// runs can double-create because match-then-create is not atomic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::entities::{source, target};
use crate::error::SyncError;
use crate::normalizer::NameNormalizer;
use crate::ports::{BrandStore, ModificationStore, SourceCatalog, VehicleStore};
use crate::report::SyncReport;

// ============================================================================
// RUN CONFIGURATION
// ============================================================================

/// Per-level commit switches. All false = preview/dry-run: the full walk and
/// matching happen, drafts are constructed and counted, nothing is written.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncSwitches {
    pub commit_brands: bool,
    pub commit_vehicles: bool,
    pub commit_modifications: bool,
}

impl SyncSwitches {
    /// Preview mode - nothing is persisted.
    pub fn dry_run() -> Self {
        Self::default()
    }

    pub fn commit_all() -> Self {
        SyncSwitches {
            commit_brands: true,
            commit_vehicles: true,
            commit_modifications: true,
        }
    }
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Cooperative cancellation flag, checked between sibling iterations at each
/// level. A node's own match/draft/persist triple is never interrupted, so a
/// cancelled run leaves no half-updated node behind.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// PER-NODE RESOLUTION
// ============================================================================

/// How a source node resolved against the target catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    /// An existing target entity matched the normalized name
    Matched,
    /// No counterpart existed - a new draft was constructed
    Drafted,
}

// ============================================================================
// SYNC ENGINE
// ============================================================================

pub struct SyncEngine<'a, S, B, V, M>
where
    S: SourceCatalog,
    B: BrandStore,
    V: VehicleStore,
    M: ModificationStore,
{
    source: &'a S,
    brands: &'a B,
    vehicles: &'a V,
    modifications: &'a M,
    normalizer: NameNormalizer,
    switches: SyncSwitches,
}

impl<'a, S, B, V, M> SyncEngine<'a, S, B, V, M>
where
    S: SourceCatalog,
    B: BrandStore,
    V: VehicleStore,
    M: ModificationStore,
{
    pub fn new(
        source: &'a S,
        brands: &'a B,
        vehicles: &'a V,
        modifications: &'a M,
        normalizer: NameNormalizer,
        switches: SyncSwitches,
    ) -> Self {
        SyncEngine {
            source,
            brands,
            vehicles,
            modifications,
            normalizer,
            switches,
        }
    }

    /// Walk the whole source hierarchy once and reconcile it into the target
    /// catalog. Structural failures abort with an error; leaf failures are
    /// logged, counted and skipped.
    pub fn run(&self, cancel: &CancelFlag) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new();

        info!(
            commit_brands = self.switches.commit_brands,
            commit_vehicles = self.switches.commit_vehicles,
            commit_modifications = self.switches.commit_modifications,
            "starting catalog sync"
        );

        let marks = self.source.marks().map_err(|source| SyncError::SourceFetch {
            entity: "marks",
            source,
        })?;
        info!(count = marks.len(), "fetched source marks");

        for mark in &marks {
            if cancel.is_cancelled() {
                break;
            }
            self.sync_mark(mark, cancel, &mut report)?;
        }

        report.cancelled = cancel.is_cancelled();
        report.finish();
        info!(summary = %report.summary(), "catalog sync finished");

        Ok(report)
    }

    // ------------------------------------------------------------------
    // Level 1: Mark → Brand
    // ------------------------------------------------------------------

    fn sync_mark(
        &self,
        mark: &source::Mark,
        cancel: &CancelFlag,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        report.brands.scanned += 1;
        let name = self.normalizer.normalize(&mark.name);

        let existing =
            self.brands
                .find_brand_by_name(&name)
                .map_err(|source| SyncError::TargetLookup {
                    entity: "brand",
                    name: name.clone(),
                    source,
                })?;

        let (mut brand, resolution) = match existing {
            Some(mut brand) => {
                brand.auto_link_id = Some(mark.id);
                report.brands.matched += 1;
                (brand, Resolution::Matched)
            }
            None => {
                debug!(mark = %mark.name, brand = %name, "no existing brand, drafting");
                report.brands.drafted += 1;
                (target::Brand::draft(name.clone(), mark.id), Resolution::Drafted)
            }
        };

        if self.switches.commit_brands {
            brand = self
                .brands
                .upsert_brand(&brand)
                .map_err(|source| SyncError::TargetPersist {
                    entity: "brand",
                    name: name.clone(),
                    source,
                })?;
            report.brands.persisted += 1;
        }

        // Descent gate: an unpersisted draft has no id for children to
        // reference. Matched brands always pass, switch or no switch.
        if !brand.is_persisted() {
            debug!(brand = %name, ?resolution, "brand has no id yet, skipping subtree");
            report.brands.skipped_subtrees += 1;
            return Ok(());
        }

        let models =
            self.source
                .models_by_mark(mark.id)
                .map_err(|source| SyncError::SourceFetch {
                    entity: "models",
                    source,
                })?;
        debug!(brand = %name, count = models.len(), "fetched source models");

        for model in &models {
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.sync_model(&brand, model, cancel, report)?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Level 2: Model → Vehicle
    // ------------------------------------------------------------------

    fn sync_model(
        &self,
        brand: &target::Brand,
        model: &source::Model,
        cancel: &CancelFlag,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        report.vehicles.scanned += 1;
        let name = self.normalizer.normalize(&model.name);

        let existing = self
            .vehicles
            .find_vehicle(brand.id, &name)
            .map_err(|source| SyncError::TargetLookup {
                entity: "vehicle",
                name: name.clone(),
                source,
            })?;

        let mut vehicle = match existing {
            Some(mut vehicle) => {
                vehicle.auto_link_id = Some(model.id);
                report.vehicles.matched += 1;
                vehicle
            }
            None => {
                debug!(model = %model.name, vehicle = %name, "no existing vehicle, drafting");
                report.vehicles.drafted += 1;
                target::Vehicle::draft(brand.id, name.clone(), model)
            }
        };

        if self.switches.commit_vehicles {
            vehicle = self
                .vehicles
                .upsert_vehicle(&vehicle)
                .map_err(|source| SyncError::TargetPersist {
                    entity: "vehicle",
                    name: name.clone(),
                    source,
                })?;
            report.vehicles.persisted += 1;
        }

        if !vehicle.is_persisted() {
            report.vehicles.skipped_subtrees += 1;
            return Ok(());
        }

        let modifications = self
            .source
            .modifications_by_model(model.id)
            .map_err(|source| SyncError::SourceFetch {
                entity: "modifications",
                source,
            })?;
        debug!(vehicle = %name, count = modifications.len(), "fetched source modifications");

        for modification in &modifications {
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.sync_modification(brand, &vehicle, modification, report)?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Level 3: Modification (leaf)
    // ------------------------------------------------------------------

    fn sync_modification(
        &self,
        brand: &target::Brand,
        vehicle: &target::Vehicle,
        modification: &source::Modification,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        report.modifications.scanned += 1;
        let name = self.normalizer.normalize(&modification.name);

        let existing = self
            .modifications
            .find_modification(vehicle.id, &name)
            .map_err(|source| SyncError::TargetLookup {
                entity: "modification",
                name: name.clone(),
                source,
            })?;

        let draft = match existing {
            Some(mut matched) => {
                // Link only. Characteristics the target already owns are
                // never overwritten by a sync run.
                matched.auto_link_id = Some(modification.id);
                report.modifications.matched += 1;
                matched
            }
            None => {
                report.modifications.drafted += 1;
                let mut draft =
                    target::Modification::draft(vehicle.id, brand.id, name.clone(), modification);

                // Enrichment applies to brand-new drafts only. A failed
                // lookup is a leaf problem: log, skip, keep the draft.
                match self.source.characteristic(modification.id) {
                    Ok(Some(characteristic)) => draft.apply_characteristic(&characteristic),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(modification = %name, error = %err, "characteristic lookup failed, skipping enrichment");
                        report.enrichment_failures += 1;
                    }
                }

                draft
            }
        };

        if self.switches.commit_modifications {
            // A single failed modification upsert loses one leaf, not the
            // rest of the tree: log and move on to the next sibling.
            match self.modifications.upsert_modification(&draft) {
                Ok(_) => report.modifications.persisted += 1,
                Err(err) => {
                    warn!(modification = %name, error = %err, "modification upsert failed, skipping");
                    report.modifications.failed += 1;
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::source::{Characteristic, Generation};
    use crate::ports::StoreError;
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use std::collections::HashMap;

    // ------------------------------------------------------------------
    // In-memory source catalog fake
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct FakeSource {
        marks: Vec<source::Mark>,
        models: HashMap<i64, Vec<source::Model>>,
        modifications: HashMap<i64, Vec<source::Modification>>,
        characteristics: HashMap<i64, Characteristic>,
        fail_models: bool,
        fail_characteristics: bool,
    }

    impl SourceCatalog for FakeSource {
        fn marks(&self) -> Result<Vec<source::Mark>, StoreError> {
            Ok(self.marks.clone())
        }

        fn models_by_mark(&self, mark_id: i64) -> Result<Vec<source::Model>, StoreError> {
            if self.fail_models {
                return Err(StoreError::msg("source connection lost"));
            }
            Ok(self.models.get(&mark_id).cloned().unwrap_or_default())
        }

        fn modifications_by_model(
            &self,
            model_id: i64,
        ) -> Result<Vec<source::Modification>, StoreError> {
            Ok(self
                .modifications
                .get(&model_id)
                .cloned()
                .unwrap_or_default())
        }

        fn characteristic(
            &self,
            modification_id: i64,
        ) -> Result<Option<Characteristic>, StoreError> {
            if self.fail_characteristics {
                return Err(StoreError::msg("characteristic table unavailable"));
            }
            Ok(self.characteristics.get(&modification_id).cloned())
        }
    }

    // ------------------------------------------------------------------
    // In-memory target catalog fake
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct FakeTarget {
        brands: RefCell<Vec<target::Brand>>,
        vehicles: RefCell<Vec<target::Vehicle>>,
        modifications: RefCell<Vec<target::Modification>>,
        next_id: RefCell<i64>,
        fail_brand_lookup: bool,
        fail_vehicle_upsert: bool,
        fail_modification_upsert: bool,
        /// Trip this flag once the first vehicle upsert lands, to exercise
        /// the between-siblings cancellation checks mid-run.
        cancel_on_vehicle_upsert: Option<CancelFlag>,
    }

    impl FakeTarget {
        fn assign_id(&self) -> i64 {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        }

        fn with_brand(self, id: i64, name: &str) -> Self {
            self.brands.borrow_mut().push(target::Brand {
                id,
                name: name.to_string(),
                auto_link_id: None,
                third_party_id: None,
            });
            let highest = (*self.next_id.borrow()).max(id);
            *self.next_id.borrow_mut() = highest;
            self
        }
    }

    impl BrandStore for FakeTarget {
        fn find_brand_by_name(&self, name: &str) -> Result<Option<target::Brand>, StoreError> {
            if self.fail_brand_lookup {
                return Err(StoreError::msg("target connection lost"));
            }
            Ok(self
                .brands
                .borrow()
                .iter()
                .find(|b| b.name.eq_ignore_ascii_case(name))
                .cloned())
        }

        fn upsert_brand(&self, brand: &target::Brand) -> Result<target::Brand, StoreError> {
            let mut stored = brand.clone();
            let mut brands = self.brands.borrow_mut();
            if stored.is_persisted() {
                brands.retain(|b| b.id != stored.id);
            } else {
                stored.id = self.assign_id();
            }
            brands.push(stored.clone());
            Ok(stored)
        }
    }

    impl VehicleStore for FakeTarget {
        fn find_vehicle(
            &self,
            brand_id: i64,
            name: &str,
        ) -> Result<Option<target::Vehicle>, StoreError> {
            Ok(self
                .vehicles
                .borrow()
                .iter()
                .find(|v| v.brand_id == brand_id && v.name.eq_ignore_ascii_case(name))
                .cloned())
        }

        fn upsert_vehicle(&self, vehicle: &target::Vehicle) -> Result<target::Vehicle, StoreError> {
            if self.fail_vehicle_upsert {
                return Err(StoreError::msg("disk full"));
            }
            let mut stored = vehicle.clone();
            let mut vehicles = self.vehicles.borrow_mut();
            if stored.is_persisted() {
                vehicles.retain(|v| v.id != stored.id);
            } else {
                stored.id = self.assign_id();
            }
            vehicles.push(stored.clone());
            if let Some(cancel) = &self.cancel_on_vehicle_upsert {
                cancel.cancel();
            }
            Ok(stored)
        }
    }

    impl ModificationStore for FakeTarget {
        fn find_modification(
            &self,
            vehicle_id: i64,
            name: &str,
        ) -> Result<Option<target::Modification>, StoreError> {
            Ok(self
                .modifications
                .borrow()
                .iter()
                .find(|m| m.vehicle_id == vehicle_id && m.name.eq_ignore_ascii_case(name))
                .cloned())
        }

        fn upsert_modification(
            &self,
            modification: &target::Modification,
        ) -> Result<target::Modification, StoreError> {
            if self.fail_modification_upsert {
                return Err(StoreError::msg("unique constraint violation"));
            }
            let mut stored = modification.clone();
            let mut modifications = self.modifications.borrow_mut();
            if stored.is_persisted() {
                modifications.retain(|m| m.id != stored.id);
            } else {
                stored.id = self.assign_id();
            }
            modifications.push(stored.clone());
            Ok(stored)
        }
    }

    // ------------------------------------------------------------------
    // Fixture helpers
    // ------------------------------------------------------------------

    fn mark(id: i64, name: &str) -> source::Mark {
        source::Mark {
            id,
            name: name.to_string(),
            name_ru: None,
            car_type_id: 1,
        }
    }

    fn model(id: i64, mark_id: i64, name: &str) -> source::Model {
        source::Model {
            id,
            mark_id,
            name: name.to_string(),
            year_from: Some(2010),
            year_to: Some(2015),
        }
    }

    fn modification(id: i64, model_id: i64, name: &str) -> source::Modification {
        source::Modification {
            id,
            model_id,
            name: name.to_string(),
            serie_name: "Sedan".to_string(),
            start_production_year: Some(2012),
            end_production_year: None,
            generation: Generation {
                name: "XI".to_string(),
                year_begin: Some(2008),
                year_end: Some(2016),
            },
        }
    }

    fn full_source() -> FakeSource {
        let mut src = FakeSource {
            marks: vec![mark(1, "Toyota"), mark(2, "ВАЗ (Lada)")],
            ..FakeSource::default()
        };
        src.models.insert(1, vec![model(10, 1, "Corolla")]);
        src.models.insert(2, vec![model(20, 2, "Vesta")]);
        src.modifications
            .insert(10, vec![modification(100, 10, "1.6 MT")]);
        src.modifications
            .insert(20, vec![modification(200, 20, "1.8 CVT")]);
        src.characteristics.insert(
            100,
            Characteristic {
                fuel_type: "petrol".to_string(),
                impulsion_type: "front".to_string(),
                horse_power: 122,
                cylinder_capacity: 1598,
            },
        );
        src
    }

    fn run_engine(
        source: &FakeSource,
        target: &FakeTarget,
        switches: SyncSwitches,
    ) -> SyncReport {
        let engine = SyncEngine::new(
            source,
            target,
            target,
            target,
            NameNormalizer::with_defaults(),
            switches,
        );
        engine.run(&CancelFlag::new()).expect("run should succeed")
    }

    // ------------------------------------------------------------------
    // Descent gate + commit switches
    // ------------------------------------------------------------------

    #[test]
    fn test_dry_run_new_brand_gates_whole_subtree() {
        let source = full_source();
        let target = FakeTarget::default();

        let report = run_engine(&source, &target, SyncSwitches::dry_run());

        // Both marks drafted but never persisted → no descent at all
        assert_eq!(report.brands.scanned, 2);
        assert_eq!(report.brands.drafted, 2);
        assert_eq!(report.brands.persisted, 0);
        assert_eq!(report.brands.skipped_subtrees, 2);
        assert_eq!(report.vehicles.scanned, 0);
        assert_eq!(report.modifications.scanned, 0);
        assert!(target.brands.borrow().is_empty());
        assert!(target.vehicles.borrow().is_empty());
    }

    #[test]
    fn test_existing_brand_subtree_walked_even_without_commit_switch() {
        let source = full_source();
        let target = FakeTarget::default().with_brand(7, "Toyota");

        let report = run_engine(&source, &target, SyncSwitches::dry_run());

        // Toyota matched → descent proceeds; LADA drafted → gated
        assert_eq!(report.brands.matched, 1);
        assert_eq!(report.brands.drafted, 1);
        assert_eq!(report.brands.skipped_subtrees, 1);
        assert_eq!(report.vehicles.scanned, 1);
        assert_eq!(report.vehicles.drafted, 1);
        // Vehicle draft is ephemeral (switch off) → modifications gated
        assert_eq!(report.vehicles.skipped_subtrees, 1);
        assert_eq!(report.modifications.scanned, 0);
    }

    #[test]
    fn test_commit_switches_are_orthogonal() {
        let source = full_source();
        let target = FakeTarget::default();
        let switches = SyncSwitches {
            commit_brands: true,
            commit_vehicles: false,
            commit_modifications: false,
        };

        let report = run_engine(&source, &target, switches);

        assert_eq!(report.brands.persisted, 2);
        // Vehicles scanned and drafted under both brands, but never persisted
        assert_eq!(report.vehicles.scanned, 2);
        assert_eq!(report.vehicles.drafted, 2);
        assert_eq!(report.vehicles.persisted, 0);
        assert_eq!(report.vehicles.skipped_subtrees, 2);
        assert_eq!(report.modifications.scanned, 0);
    }

    // ------------------------------------------------------------------
    // End to end
    // ------------------------------------------------------------------

    #[test]
    fn test_end_to_end_commit_all_builds_full_tree() {
        let source = full_source();
        let target = FakeTarget::default();

        let report = run_engine(&source, &target, SyncSwitches::commit_all());

        assert_eq!(report.brands.persisted, 2);
        assert_eq!(report.vehicles.persisted, 2);
        assert_eq!(report.modifications.persisted, 2);

        // Second brand carries the canonical alias, not the Cyrillic label
        let brands = target.brands.borrow();
        let names: Vec<&str> = brands.iter().map(|b| b.name.as_str()).collect();
        assert!(names.contains(&"Toyota"));
        assert!(names.contains(&"LADA"));

        // Foreign keys reference persisted parents
        for vehicle in target.vehicles.borrow().iter() {
            assert!(brands.iter().any(|b| b.id == vehicle.brand_id));
            assert!(vehicle.is_persisted());
        }
        for m in target.modifications.borrow().iter() {
            assert!(target.vehicles.borrow().iter().any(|v| v.id == m.vehicle_id));
        }
    }

    #[test]
    fn test_vehicle_draft_year_span_from_source_model() {
        let source = full_source();
        let target = FakeTarget::default();

        run_engine(&source, &target, SyncSwitches::commit_all());

        let vehicles = target.vehicles.borrow();
        let corolla = vehicles.iter().find(|v| v.name == "Corolla").unwrap();
        assert_eq!(corolla.year_from, NaiveDate::from_ymd_opt(2010, 1, 1));
        assert_eq!(corolla.year_to, NaiveDate::from_ymd_opt(2015, 12, 31));
    }

    #[test]
    fn test_modification_year_prefers_own_production_year() {
        let source = full_source();
        let target = FakeTarget::default();

        run_engine(&source, &target, SyncSwitches::commit_all());

        let modifications = target.modifications.borrow();
        let m = modifications.iter().find(|m| m.name == "1.6 MT").unwrap();
        // Own StartProductionYear=2012 wins over Generation.YearBegin=2008
        assert_eq!(m.year_from, NaiveDate::from_ymd_opt(2012, 1, 1));
        // End bound absent on the modification → generation fallback
        assert_eq!(m.year_to, NaiveDate::from_ymd_opt(2016, 12, 31));
    }

    // ------------------------------------------------------------------
    // Characteristic enrichment
    // ------------------------------------------------------------------

    #[test]
    fn test_enrichment_applies_to_new_drafts_only() {
        let source = full_source();
        let target = FakeTarget::default();

        run_engine(&source, &target, SyncSwitches::commit_all());

        let modifications = target.modifications.borrow();
        let enriched = modifications.iter().find(|m| m.name == "1.6 MT").unwrap();
        assert_eq!(enriched.fuel_type, "petrol");
        assert_eq!(enriched.horse_power, 122);

        // No characteristic rows for the second modification → fields stay empty
        let plain = modifications.iter().find(|m| m.name == "1.8 CVT").unwrap();
        assert_eq!(plain.fuel_type, "");
        assert_eq!(plain.horse_power, 0);
    }

    #[test]
    fn test_matched_modification_keeps_its_characteristics() {
        let source = full_source();
        let target = FakeTarget::default();

        // First run persists the enriched modification
        run_engine(&source, &target, SyncSwitches::commit_all());

        // Pretend the business corrected the fuel type by hand
        {
            let mut modifications = target.modifications.borrow_mut();
            let m = modifications.iter_mut().find(|m| m.name == "1.6 MT").unwrap();
            m.fuel_type = "E85".to_string();
        }

        // Second run matches instead of drafting and must not overwrite
        let report = run_engine(&source, &target, SyncSwitches::commit_all());
        assert_eq!(report.modifications.matched, 2);

        let modifications = target.modifications.borrow();
        let m = modifications.iter().find(|m| m.name == "1.6 MT").unwrap();
        assert_eq!(m.fuel_type, "E85");
        // But the linkage was refreshed
        assert_eq!(m.auto_link_id, Some(100));
    }

    #[test]
    fn test_enrichment_failure_does_not_block_persistence() {
        let mut source = full_source();
        source.fail_characteristics = true;
        let target = FakeTarget::default();

        let report = run_engine(&source, &target, SyncSwitches::commit_all());

        assert_eq!(report.enrichment_failures, 2);
        assert_eq!(report.modifications.persisted, 2);
        let modifications = target.modifications.borrow();
        assert!(modifications.iter().all(|m| m.fuel_type.is_empty()));
    }

    // ------------------------------------------------------------------
    // Error tiers
    // ------------------------------------------------------------------

    #[test]
    fn test_structural_source_failure_aborts_run() {
        let mut source = full_source();
        source.fail_models = true;
        let target = FakeTarget::default();

        let engine = SyncEngine::new(
            &source,
            &target,
            &target,
            &target,
            NameNormalizer::with_defaults(),
            SyncSwitches::commit_all(),
        );

        let err = engine.run(&CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SyncError::SourceFetch { entity: "models", .. }));
    }

    #[test]
    fn test_structural_brand_lookup_failure_aborts_run() {
        let source = full_source();
        let target = FakeTarget {
            fail_brand_lookup: true,
            ..FakeTarget::default()
        };

        let engine = SyncEngine::new(
            &source,
            &target,
            &target,
            &target,
            NameNormalizer::with_defaults(),
            SyncSwitches::dry_run(),
        );

        let err = engine.run(&CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SyncError::TargetLookup { entity: "brand", .. }));
        assert!(target.brands.borrow().is_empty());
    }

    #[test]
    fn test_structural_vehicle_upsert_failure_aborts_run() {
        let source = full_source();
        let target = FakeTarget {
            fail_vehicle_upsert: true,
            ..FakeTarget::default()
        };

        let engine = SyncEngine::new(
            &source,
            &target,
            &target,
            &target,
            NameNormalizer::with_defaults(),
            SyncSwitches::commit_all(),
        );

        let err = engine.run(&CancelFlag::new()).unwrap_err();
        assert!(matches!(err, SyncError::TargetPersist { entity: "vehicle", .. }));
        // The brand upsert above the failing vehicle already landed
        assert_eq!(target.brands.borrow().len(), 1);
        assert!(target.vehicles.borrow().is_empty());
        assert!(target.modifications.borrow().is_empty());
    }

    #[test]
    fn test_modification_upsert_failure_is_leaf_level() {
        let source = full_source();
        let target = FakeTarget {
            fail_modification_upsert: true,
            ..FakeTarget::default()
        };

        let report = run_engine(&source, &target, SyncSwitches::commit_all());

        // Run completed; both leaves failed, everything above persisted
        assert_eq!(report.modifications.failed, 2);
        assert_eq!(report.modifications.persisted, 0);
        assert_eq!(report.brands.persisted, 2);
        assert_eq!(report.vehicles.persisted, 2);
    }

    // ------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------

    #[test]
    fn test_pre_cancelled_run_does_nothing() {
        let source = full_source();
        let target = FakeTarget::default();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let engine = SyncEngine::new(
            &source,
            &target,
            &target,
            &target,
            NameNormalizer::with_defaults(),
            SyncSwitches::commit_all(),
        );
        let report = engine.run(&cancel).unwrap();

        assert!(report.cancelled);
        assert_eq!(report.brands.scanned, 0);
        assert!(target.brands.borrow().is_empty());
    }

    #[test]
    fn test_mid_run_cancellation_stops_between_siblings() {
        let source = full_source();
        let cancel = CancelFlag::new();
        let target = FakeTarget {
            cancel_on_vehicle_upsert: Some(cancel.clone()),
            ..FakeTarget::default()
        };

        let engine = SyncEngine::new(
            &source,
            &target,
            &target,
            &target,
            NameNormalizer::with_defaults(),
            SyncSwitches::commit_all(),
        );
        let report = engine.run(&cancel).unwrap();

        assert!(report.cancelled);
        // The node in flight when the flag tripped completed its full
        // match/draft/persist sequence
        assert_eq!(report.vehicles.scanned, 1);
        assert_eq!(report.vehicles.persisted, 1);
        assert_eq!(target.vehicles.borrow().len(), 1);
        assert!(target.vehicles.borrow()[0].is_persisted());
        // No descent below it and no further siblings at any level: the
        // second mark was never scanned, the modification loop never entered
        assert_eq!(report.brands.scanned, 1);
        assert_eq!(report.brands.persisted, 1);
        assert_eq!(target.brands.borrow().len(), 1);
        assert_eq!(report.modifications.scanned, 0);
        assert!(target.modifications.borrow().is_empty());
    }

    #[test]
    fn test_linkage_attached_on_match() {
        let source = full_source();
        let target = FakeTarget::default().with_brand(7, "Toyota");

        run_engine(&source, &target, SyncSwitches::commit_all());

        let brands = target.brands.borrow();
        let toyota = brands.iter().find(|b| b.name == "Toyota").unwrap();
        // Matched brand keeps its id but gains the source linkage
        assert_eq!(toyota.id, 7);
        assert_eq!(toyota.auto_link_id, Some(1));
    }
}
