#![allow(dead_code)]

use std::sync::Arc;

use chrono::NaiveDate;
use tontine_runtime::{EngineConfig, InMemoryDirectory, NewContribution, TontineEngine};
use tontine_types::{
    Actor, ActorRole, Amount, AssociationId, AssociationSpec, CommandContext, Frequency,
    MemberId, MemberProfile, MemberRef, TourId,
};

pub fn treasurer() -> CommandContext {
    CommandContext::new(Actor::new("treasurer-1", ActorRole::Treasurer))
}

pub fn directory() -> Arc<InMemoryDirectory> {
    Arc::new(InMemoryDirectory::with_members([
        MemberProfile::new("m1", "Awa"),
        MemberProfile::new("m2", "Bakary"),
        MemberProfile::new("m3", "Coumba"),
        MemberProfile::new("m4", "Djibril"),
    ]))
}

pub fn engine() -> TontineEngine {
    TontineEngine::new(EngineConfig::default(), directory())
        .unwrap()
        .with_rng_seed(2026)
}

/// Association with m1..m3 active and a 10,000 contribution amount
pub fn setup(engine: &TontineEngine) -> AssociationId {
    let ctx = treasurer();
    let spec = AssociationSpec::new(
        "Tontine des amis",
        Amount::new(10_000),
        Frequency::Monthly,
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
    );
    let association = engine.create_association(spec, &ctx).unwrap();
    for id in ["m1", "m2", "m3"] {
        engine
            .add_member(&association.id, MemberRef::Id(MemberId::new(id)), &ctx)
            .unwrap();
    }
    association.id
}

pub fn pay(member: &str, tour_id: &TourId, amount: u64) -> NewContribution {
    NewContribution::new(MemberId::new(member), tour_id.clone(), Amount::new(amount))
}
