use std::collections::{HashMap, HashSet};

use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Board, BoardColumn, CrmError, CrmStage, Lead};

pub struct BoardService {
    supabase: SupabaseClient,
}

/// Groups open leads under their stage. Leads pointing at a missing stage
/// end up in `unassigned`.
pub fn build_board(mut stages: Vec<CrmStage>, leads: Vec<Lead>) -> Board {
    stages.sort_by_key(|s| s.position);
    let known: HashSet<Uuid> = stages.iter().map(|s| s.id).collect();

    let mut by_stage: HashMap<Uuid, Vec<Lead>> = HashMap::new();
    let mut unassigned = Vec::new();

    for lead in leads {
        match lead.stage_id {
            Some(stage_id) if known.contains(&stage_id) => {
                by_stage.entry(stage_id).or_default().push(lead)
            }
            _ => unassigned.push(lead),
        }
    }

    let stages = stages
        .into_iter()
        .map(|stage| {
            let mut leads = by_stage.remove(&stage.id).unwrap_or_default();
            leads.sort_by_key(|l| l.position);
            BoardColumn { stage, leads }
        })
        .collect();

    unassigned.sort_by_key(|l| l.created_at);

    Board { stages, unassigned }
}

/// Final order of a column after dropping `moved` at `position`.
/// Out-of-range positions are clamped to the ends.
pub fn place_in_column(column: &[Uuid], moved: Uuid, position: i32) -> Vec<Uuid> {
    let mut order: Vec<Uuid> = column.iter().copied().filter(|id| *id != moved).collect();
    let index = position.clamp(0, order.len() as i32) as usize;
    order.insert(index, moved);
    order
}

impl BoardService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn get_board(&self, auth_token: &str) -> Result<Board, CrmError> {
        debug!("Loading CRM board");

        let stages_fut = self.supabase.request::<Vec<CrmStage>>(
            Method::GET,
            "/rest/v1/crm_stages?order=position.asc",
            Some(auth_token),
            None,
        );
        let leads_fut = self.supabase.request::<Vec<Lead>>(
            Method::GET,
            "/rest/v1/crm_leads?status=eq.open&order=position.asc",
            Some(auth_token),
            None,
        );

        let (stages, leads) = futures::try_join!(stages_fut, leads_fut)?;

        Ok(build_board(stages, leads))
    }
}
