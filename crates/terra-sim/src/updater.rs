//! Nation updater (component E): one tick of per-nation logic, applied as a
//! pure function over the previous state. Processing order is fixed and
//! documented so re-running the same (state, commands, map, config) tuple
//! always yields the same next state.

use terra_core::config::Config;
use terra_map::CellStore;
use terra_worldgen::Map;

use crate::command::Command;
use crate::nation::{ArrowOrder, ArrowType, Nation, NationStatus};
use crate::state::{group_by_owner, RoomState, RoomStatus};

/// Runs one tick's worth of nation logic and returns the next state.
/// `commands` is already drained from the room's command channel in
/// arrival order; this function only reorders them by owner (stable,
/// ascending owner id) to process nations deterministically.
pub fn advance(mut state: RoomState, map: &CellStore, commands: Vec<Command>, cfg: &Config) -> RoomState {
    if state.status != RoomStatus::Open {
        // Paused/ended/error rooms don't tick: the scheduler is expected not
        // to call this at all while paused, but staying a no-op here keeps
        // the invariant (tickCount frozen under pause) true even if it does.
        return state;
    }

    let grouped = group_by_owner(commands);
    apply_commands(&mut state, &grouped, map, cfg);
    propagate_arrows(&mut state, map, cfg);
    resolve_combat(&mut state, map, cfg);
    cleanup_arrows(&mut state);
    expand_territory(&mut state, map, cfg);
    update_population_and_resources(&mut state, cfg);
    apply_defeat(&mut state);
    apply_victory(&mut state, map, cfg);

    state.tick_count += 1;
    state
}

// ---------------------------------------------------------------------
// 1. Apply queued commands
// ---------------------------------------------------------------------
fn apply_commands(
    state: &mut RoomState,
    grouped: &std::collections::BTreeMap<String, Vec<Command>>,
    map: &CellStore,
    cfg: &Config,
) {
    for (owner, commands) in grouped {
        for command in commands {
            apply_one(state, owner, command, map, cfg);
        }
    }
}

/// Marks every cell in `vacated` unclaimable until `tickCount +
/// scorched_cooldown_ticks`. A no-op when the cooldown is disabled (the
/// documented default).
fn scorch_cells(state: &mut RoomState, vacated: &crate::territory::Territory, cfg: &Config) {
    if cfg.gameplay.scorched_cooldown_ticks == 0 {
        return;
    }
    let until = state.tick_count + cfg.gameplay.scorched_cooldown_ticks;
    for (x, y) in vacated.iter() {
        state.scorched.insert((x, y), until);
    }
}

fn apply_one(state: &mut RoomState, owner: &str, command: &Command, map: &CellStore, cfg: &Config) {
    match command {
        Command::Join { user_id, password } => {
            if !state.players.iter().any(|p| &p.user_id == user_id) {
                state.players.push(crate::state::Player { user_id: user_id.clone(), password: password.clone() });
            }
        }
        Command::FoundNation { owner, x, y } => {
            if state.nations.contains_key(owner) {
                return; // already founded, dropped silently (error surfaced at intake)
            }
            if !map.is_land(*x, *y, cfg.world.sea_level) || map.is_river(*x, *y) {
                return;
            }
            if state.territory_owner(*x, *y).is_some() {
                return;
            }
            state.nations.insert(owner.clone(), Nation::found(owner.clone(), *x, *y));
        }
        Command::BuildCity { owner, x, y, city_type, name } => {
            build_city(state, owner, *x, *y, city_type, name.clone(), map, cfg);
        }
        Command::BuildStructure { owner, x, y, structure_type } => {
            build_structure(state, owner, *x, *y, structure_type, map, cfg);
        }
        Command::Arrow { owner, arrow_type, path, percent } => {
            start_arrow(state, owner, *arrow_type, path.clone(), *percent, cfg);
        }
        Command::ClearArrow { owner, arrow_type } => {
            if let Some(nation) = state.nations.get_mut(owner) {
                match arrow_type {
                    ArrowType::Attack => nation.attack_arrows.clear(),
                    ArrowType::Defend => nation.defend_arrow = None,
                }
            }
        }
        Command::SetTroopTarget { owner, target } => {
            if let Some(nation) = state.nations.get_mut(owner) {
                nation.troop_target = target.clamp(0.0, 1.0);
            }
        }
        Command::SetAttackPercent { owner, percent } => {
            if let Some(nation) = state.nations.get_mut(owner) {
                nation.attack_percent = percent.clamp(0.05, 1.0);
            }
        }
        Command::Quit { owner } => {
            let vacated = state.nations.get_mut(owner).map(|nation| {
                let vacated = nation.territory.clone();
                nation.mark_defeated();
                vacated
            });
            if let Some(vacated) = vacated {
                scorch_cells(state, &vacated, cfg);
            }
        }
        Command::Pause => state.status = RoomStatus::Paused,
        Command::Unpause => {
            if state.status == RoomStatus::Paused {
                state.status = RoomStatus::Open;
            }
        }
        Command::End => state.status = RoomStatus::Ended,
    }
}

fn build_city(
    state: &mut RoomState,
    owner: &str,
    x: u32,
    y: u32,
    city_type: &str,
    name: Option<String>,
    map: &CellStore,
    cfg: &Config,
) {
    let Some(nation) = state.nations.get_mut(owner) else { return };
    if !nation.is_active() || !nation.territory.contains(x, y) {
        return;
    }
    if nation.cities.iter().any(|c| c.x == x && c.y == y) {
        return;
    }
    if !debit(nation, cfg.gameplay.build_costs.structures.get("city")) {
        return;
    }
    nation.cities.push(crate::nation::City {
        x,
        y,
        city_type: city_type.to_string(),
        name: name.unwrap_or_else(|| format!("{}-{}-{}", owner, x, y)),
    });
    let _ = map; // location validity (owned, land) already covered by territory check
}

fn build_structure(
    state: &mut RoomState,
    owner: &str,
    x: u32,
    y: u32,
    structure_type: &str,
    _map: &CellStore,
    cfg: &Config,
) {
    let Some(nation) = state.nations.get_mut(owner) else { return };
    if !nation.is_active() || !nation.territory.contains(x, y) {
        return;
    }
    if nation.structures.iter().any(|s| s.x == x && s.y == y) {
        return;
    }
    if !debit(nation, cfg.gameplay.build_costs.structures.get(structure_type)) {
        return;
    }
    nation.structures.push(crate::nation::Structure {
        x,
        y,
        structure_type: structure_type.to_string(),
    });
}

fn debit(nation: &mut Nation, cost: Option<&std::collections::BTreeMap<String, f32>>) -> bool {
    let Some(cost) = cost else { return true };
    for (resource, amount) in cost {
        if nation.resources.get(resource).copied().unwrap_or(0.0) < *amount {
            return false; // unaffordable, drop silently (§4.E: error only surfaced at intake)
        }
    }
    for (resource, amount) in cost {
        *nation.resources.entry(resource.clone()).or_insert(0.0) -= amount;
    }
    true
}

fn start_arrow(state: &mut RoomState, owner: &str, arrow_type: ArrowType, path: Vec<(u32, u32)>, percent: f32, cfg: &Config) {
    let Some(nation) = state.nations.get_mut(owner) else { return };
    if !nation.is_active() || path.len() < 2 {
        return;
    }
    if !nation.territory.contains(path[0].0, path[0].1) {
        return;
    }
    let percent = percent.clamp(0.05, 1.0);
    let order = ArrowOrder {
        arrow_type,
        path,
        remaining_power: nation.population * percent,
        current_index: 0,
        percent,
    };
    match arrow_type {
        ArrowType::Attack => {
            if nation.attack_arrows.len() < cfg.gameplay.max_attack_arrows {
                nation.attack_arrows.push(order);
            }
        }
        ArrowType::Defend => nation.defend_arrow = Some(order),
    }
}

// ---------------------------------------------------------------------
// 2. Arrow propagation
// ---------------------------------------------------------------------
fn biome_cost(map: &CellStore, x: u32, y: u32) -> f32 {
    match map.get(x, y).biome {
        terra_worldgen::Biome::Mountain => 3.0,
        terra_worldgen::Biome::River => 1.5,
        terra_worldgen::Biome::Ocean => 8.0,
        _ => 1.0,
    }
}

fn propagate_arrows(state: &mut RoomState, map: &CellStore, cfg: &Config) {
    let owners: Vec<String> = state.nations.keys().cloned().collect();
    for owner in owners {
        let Some(nation) = state.nations.get_mut(&owner) else { continue };
        if !nation.is_active() {
            continue;
        }
        let speed = cfg.gameplay.armies.stats.get("attack").map(|s| s.speed).unwrap_or(1.0);
        for arrow in &mut nation.attack_arrows {
            // An arrow that already reached its last cell sits there for
            // combat to resolve against; it's reaped afterward in
            // `cleanup_arrows`, not here, so combat still sees it this tick.
            if arrow.is_complete() {
                continue;
            }
            if let Some((nx, ny)) = arrow.next_cell() {
                let cost = biome_cost(map, nx, ny);
                let step = (speed / cost).max(0.05);
                arrow.remaining_power -= step * 0.1; // attrition of the march itself
                arrow.current_index += 1;
            }
        }
    }
}

/// Removes arrows that are spent or have finished their path and already
/// had their chance to resolve combat this tick. A completed defend arrow
/// simply returns its troops to the owner (a no-op beyond removal, since
/// troop counts live on `population`/`remaining_power`, not a separate
/// pool).
fn cleanup_arrows(state: &mut RoomState) {
    for nation in state.nations.values_mut() {
        nation
            .attack_arrows
            .retain(|a| !a.is_complete() && a.remaining_power > 0.0);
        if let Some(defend) = &nation.defend_arrow {
            if defend.is_complete() {
                nation.defend_arrow = None;
            }
        }
    }
}

// ---------------------------------------------------------------------
// 3. Combat resolution
// ---------------------------------------------------------------------
/// Attacker attrition formula (Open Question, decided in DESIGN.md): both
/// sides lose a flat 30% of the power committed to the contest; the loser
/// additionally loses the cell (or the arrow, if attacking). Ties favor the
/// defender.
const ATTRITION_FRACTION: f32 = 0.3;

fn defender_power(nation: &Nation, x: u32, y: u32) -> f32 {
    let density = nation.population / (nation.territory_cells().max(1) as f32);
    let fort_multiplier = if nation.structures.iter().any(|s| s.x == x && s.y == y && s.structure_type == "fort") {
        2.0
    } else {
        1.0
    };
    density * fort_multiplier
}

fn resolve_combat(state: &mut RoomState, map: &CellStore, cfg: &Config) {
    let _ = cfg;
    let owners: Vec<String> = state.nations.keys().cloned().collect();
    // Each contested cell gets at most one transfer per tick; track which
    // cells already changed hands this tick.
    let mut settled: std::collections::HashSet<(u32, u32)> = std::collections::HashSet::new();

    for attacker_owner in &owners {
        let arrow_targets: Vec<(usize, (u32, u32))> = {
            let Some(attacker) = state.nations.get(attacker_owner) else { continue };
            attacker
                .attack_arrows
                .iter()
                .enumerate()
                .map(|(i, arrow)| (i, arrow.current_cell()))
                .collect()
        };

        for (arrow_idx, (x, y)) in arrow_targets {
            if settled.contains(&(x, y)) {
                continue;
            }
            let Some(defender_owner) = state.territory_owner(x, y).map(str::to_string) else { continue };
            if defender_owner == *attacker_owner {
                continue;
            }
            let attacker_power = match state.nations.get(attacker_owner) {
                Some(n) => n.attack_arrows.get(arrow_idx).map(|a| a.remaining_power).unwrap_or(0.0),
                None => continue,
            };
            let defense = match state.nations.get(&defender_owner) {
                Some(n) => defender_power(n, x, y),
                None => continue,
            };

            if attacker_power > defense {
                // attacker wins: ownership transfers, both sides attrited
                if let Some(defender) = state.nations.get_mut(&defender_owner) {
                    defender.territory.remove(x, y);
                }
                if let Some(attacker) = state.nations.get_mut(attacker_owner) {
                    attacker.territory.insert(x, y);
                    if let Some(arrow) = attacker.attack_arrows.get_mut(arrow_idx) {
                        arrow.remaining_power -= attacker_power * ATTRITION_FRACTION;
                    }
                }
                settled.insert((x, y));
            } else {
                // defender wins (or ties): attacker's arrow is attrited and may terminate
                if let Some(attacker) = state.nations.get_mut(attacker_owner) {
                    if let Some(arrow) = attacker.attack_arrows.get_mut(arrow_idx) {
                        arrow.remaining_power -= defense * ATTRITION_FRACTION;
                    }
                }
            }
        }
    }

    let _ = map;
}

// ---------------------------------------------------------------------
// 4. Territory dynamics (no arrow)
// ---------------------------------------------------------------------
fn expand_territory(state: &mut RoomState, map: &CellStore, cfg: &Config) {
    let owners: Vec<String> = state.nations.keys().cloned().collect();
    let mut claimed_this_tick: std::collections::HashSet<(u32, u32)> = std::collections::HashSet::new();

    for owner in owners {
        let Some(nation) = state.nations.get(&owner) else { continue };
        if !nation.is_active() {
            continue;
        }
        let candidates = border_candidates(nation, map, cfg);
        for (x, y, score) in candidates {
            if claimed_this_tick.contains(&(x, y)) {
                continue;
            }
            if state.territory_owner(x, y).is_some() {
                continue;
            }
            if state.is_scorched(x, y) {
                continue;
            }
            // probabilistic claim, deterministic given (tick, owner, cell):
            // scores in [0,1] above a fixed bar of 0.5 are accepted.
            if score < 0.5 {
                continue;
            }
            if let Some(nation) = state.nations.get_mut(&owner) {
                nation.territory.insert(x, y);
            }
            claimed_this_tick.insert((x, y));
        }
    }
}

/// Raster-ordered border candidates with a desirability score in [0,1]
/// combining biome desirability and adjacency-to-existing-territory bonus.
fn border_candidates(nation: &Nation, map: &CellStore, cfg: &Config) -> Vec<(u32, u32, f32)> {
    let dims = map.metadata();
    let mut out = Vec::new();
    for y in 0..dims.height {
        for x in 0..dims.width {
            if !map.is_land(x, y, cfg.world.sea_level) {
                continue;
            }
            if nation.territory.contains(x, y) {
                continue;
            }
            let adjacent = map
                .map()
                .neighbors4(x, y)
                .filter(|&(nx, ny)| nation.territory.contains(nx, ny))
                .count();
            if adjacent == 0 {
                continue;
            }
            let biome_name = map.get(x, y).biome.name();
            let desirability = cfg
                .gameplay
                .biome_desirability_scores
                .get(biome_name)
                .copied()
                .unwrap_or(0.5);
            let adjacency_bonus = (adjacent as f32 / 4.0) * (cfg.gameplay.cell_desirability_bonus.adjacent_weight / 100.0);
            let score = (desirability * 0.7 + adjacency_bonus).min(1.0);
            out.push((x, y, score));
        }
    }
    out
}

// ---------------------------------------------------------------------
// 5. Population & resources
// ---------------------------------------------------------------------
fn update_population_and_resources(state: &mut RoomState, cfg: &Config) {
    for nation in state.nations.values_mut() {
        if !nation.is_active() {
            continue;
        }
        let territory = nation.territory_cells() as f32;
        if territory <= 0.0 {
            continue;
        }
        let city_count = nation.cities.len() as f32;
        let growth = cfg.gameplay.population.growth_rate
            * territory
            * (1.0 + cfg.gameplay.city_bonus * city_count / territory.max(1.0) / 1000.0);
        let cap = cfg.gameplay.population.max_per_territory * territory + cfg.gameplay.city_bonus * city_count;
        nation.population = (nation.population + growth).min(cap).max(0.0);

        let yield_per_cell = cfg.gameplay.resource.base_yield;
        let structure_bonus = 1.0 + 0.1 * nation.structures.len() as f32;
        for resource in terra_worldgen::Resource::ALL {
            let key = resource_key(resource);
            let entry = nation.resources.entry(key.to_string()).or_insert(0.0);
            *entry = (*entry + yield_per_cell * structure_bonus).max(0.0);
        }
    }
}

fn resource_key(resource: terra_worldgen::Resource) -> &'static str {
    match resource {
        terra_worldgen::Resource::Food => "food",
        terra_worldgen::Resource::Wood => "wood",
        terra_worldgen::Resource::Stone => "stone",
        terra_worldgen::Resource::Iron => "iron",
        terra_worldgen::Resource::Gold => "gold",
        terra_worldgen::Resource::Horses => "horses",
    }
}

// ---------------------------------------------------------------------
// 7. Defeat
// ---------------------------------------------------------------------
fn apply_defeat(state: &mut RoomState) {
    for nation in state.nations.values_mut() {
        if nation.is_active() && nation.territory_cells() == 0 {
            nation.mark_defeated();
        }
    }
    // Combat-driven defeats never vacate land (cells transfer straight to
    // the attacker), so only `Command::Quit` ever populates `scorched`; this
    // is the tick's natural place to garbage-collect entries whose cooldown
    // has elapsed, rather than letting the map grow unbounded.
    let tick = state.tick_count;
    state.scorched.retain(|_, until| *until > tick);
}

// ---------------------------------------------------------------------
// 8. Victory
// ---------------------------------------------------------------------
fn apply_victory(state: &mut RoomState, map: &CellStore, cfg: &Config) {
    let denominator = total_denominator(map, cfg);
    if denominator == 0 {
        return;
    }
    let mut winner = None;
    for nation in state.nations.values() {
        if !nation.is_active() {
            continue;
        }
        let pct = nation.territory_cells() as f32 / denominator as f32 * 100.0;
        if pct >= cfg.gameplay.win_condition_percentage {
            winner = Some(nation.owner.clone());
            break;
        }
    }
    if let Some(owner) = winner {
        if let Some(nation) = state.nations.get_mut(&owner) {
            nation.mark_winner();
        }
        state.winning_nation = Some(owner);
        state.status = RoomStatus::Ended;
    }
}

fn total_denominator(map: &CellStore, cfg: &Config) -> usize {
    let dims = map.metadata();
    if cfg.gameplay.win_counts_all_land_cells {
        land_cell_count(map.map(), cfg.world.sea_level)
    } else {
        (dims.width * dims.height) as usize
    }
}

fn land_cell_count(map: &Map, sea_level: f32) -> usize {
    map.cells.iter().filter(|c| c.is_land(sea_level)).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RoomId;
    use terra_core::config::Config;
    use terra_map::CellStore;

    fn store(width: u32, height: u32) -> CellStore {
        let map = terra_worldgen::Generator::new(width, height, 7, 3, Config::default().world)
            .unwrap()
            .generate();
        CellStore::new(map, 64)
    }

    fn land_cell(store: &CellStore, sea_level: f32) -> (u32, u32) {
        let dims = store.metadata();
        for y in 0..dims.height {
            for x in 0..dims.width {
                if store.is_land(x, y, sea_level) {
                    return (x, y);
                }
            }
        }
        panic!("no land cell found");
    }

    #[test]
    fn found_nation_creates_single_cell_territory() {
        let cfg = Config::default();
        let store = store(30, 30);
        let (x, y) = land_cell(&store, cfg.world.sea_level);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Open;
        let commands = vec![Command::FoundNation { owner: "P1".into(), x, y }];
        let state = advance(state, &store, commands, &cfg);
        let nation = &state.nations["P1"];
        assert_eq!(nation.territory_cells(), 1);
        assert_eq!(nation.population, 100.0);
        assert_eq!(nation.national_will, 50);
    }

    #[test]
    fn founding_twice_is_a_noop() {
        let cfg = Config::default();
        let store = store(30, 30);
        let (x, y) = land_cell(&store, cfg.world.sea_level);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Open;
        let commands = vec![
            Command::FoundNation { owner: "P1".into(), x, y },
            Command::FoundNation { owner: "P1".into(), x: x.wrapping_add(1), y },
        ];
        let state = advance(state, &store, commands, &cfg);
        assert_eq!(state.nations["P1"].starting_cell, (x, y));
    }

    #[test]
    fn zero_territory_after_tick_defeats_nation() {
        let cfg = Config::default();
        let store = store(30, 30);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Open;
        let mut nation = Nation::found("P1", 5, 5);
        nation.territory.remove(5, 5);
        state.nations.insert("P1".into(), nation);
        let state = advance(state, &store, vec![], &cfg);
        let nation = &state.nations["P1"];
        assert_eq!(nation.status, NationStatus::Defeated);
        assert!(nation.territory.is_empty());
    }

    #[test]
    fn paused_room_does_not_advance_tick_count() {
        let cfg = Config::default();
        let store = store(10, 10);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Paused;
        let before = state.tick_count;
        let state = advance(state, &store, vec![], &cfg);
        assert_eq!(state.tick_count, before);
    }

    #[test]
    fn quit_scorches_vacated_cells_when_cooldown_is_set() {
        let mut cfg = Config::default();
        cfg.gameplay.scorched_cooldown_ticks = 5;
        let store = store(30, 30);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Open;
        state.nations.insert("P1".into(), Nation::found("P1", 5, 5));
        let state = advance(state, &store, vec![Command::Quit { owner: "P1".into() }], &cfg);
        assert!(state.is_scorched(5, 5));
        assert_eq!(state.scorched[&(5, 5)], state.tick_count + 5);
    }

    #[test]
    fn scorched_cells_are_not_reclaimed_by_expansion() {
        let mut cfg = Config::default();
        cfg.gameplay.scorched_cooldown_ticks = 100;
        let store = store(30, 30);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Open;
        state.nations.insert("P2".into(), Nation::found("P2", 6, 5));
        state.scorched.insert((5, 5), state.tick_count + 100);
        let state = advance(state, &store, vec![], &cfg);
        assert!(state.territory_owner(5, 5).is_none());
    }

    #[test]
    fn zero_cooldown_never_scorches() {
        let cfg = Config::default();
        assert_eq!(cfg.gameplay.scorched_cooldown_ticks, 0);
        let store = store(30, 30);
        let mut state = RoomState::new(RoomId::default(), "r", "P1");
        state.status = RoomStatus::Open;
        state.nations.insert("P1".into(), Nation::found("P1", 5, 5));
        let state = advance(state, &store, vec![Command::Quit { owner: "P1".into() }], &cfg);
        assert!(state.scorched.is_empty());
    }
}
