//! End-to-end request → select → apply → rollback → dispense scenarios.
//!
//! Selection is driven by test doubles that fail the test if the entry
//! point the request should not reach is ever called.

use podgrid_resources::*;

fn ledger() -> Node {
    Node::new("TestNode")
        .with_core("0", 10_000)
        .with_core("1", 10_000)
        .with_numa("0", "0")
        .with_numa("1", "1")
        .with_numa_memory("0", 1024)
        .with_numa_memory("1", 1204)
        .with_memory(10_240)
}

fn core_plan() -> CpuMap {
    CpuMap::from([("0".to_string(), 10_000), ("1".to_string(), 10_000)])
}

fn snapshot() -> Vec<NodeInfo> {
    let mut info = NodeInfo::from(&ledger());
    info.cpu_plan = vec![core_plan()];
    info.capacity = 1;
    vec![info]
}

/// Answers only on the CPU path.
struct CpuOnly;

impl Scheduler for CpuOnly {
    fn select_cpu_nodes(
        &self,
        _request: &ResourceRequest,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<CpuSelection> {
        let plans = CpuPlans::from([("TestNode".to_string(), vec![core_plan()])]);
        Ok(CpuSelection {
            nodes,
            plans,
            total: 1,
        })
    }

    fn select_memory_nodes(
        &self,
        _request: &ResourceRequest,
        _nodes: Vec<NodeInfo>,
    ) -> ResourceResult<MemorySelection> {
        panic!("memory selection must not run for a cpu-bind request");
    }
}

/// Answers only on the memory path.
struct MemoryOnly;

impl Scheduler for MemoryOnly {
    fn select_cpu_nodes(
        &self,
        _request: &ResourceRequest,
        _nodes: Vec<NodeInfo>,
    ) -> ResourceResult<CpuSelection> {
        panic!("cpu selection must not run for a share request");
    }

    fn select_memory_nodes(
        &self,
        _request: &ResourceRequest,
        nodes: Vec<NodeInfo>,
    ) -> ResourceResult<MemorySelection> {
        Ok(MemorySelection { nodes, total: 1 })
    }
}

/// Fails the test on any call.
struct Unreachable;

impl Scheduler for Unreachable {
    fn select_cpu_nodes(
        &self,
        _request: &ResourceRequest,
        _nodes: Vec<NodeInfo>,
    ) -> ResourceResult<CpuSelection> {
        panic!("selection reached");
    }

    fn select_memory_nodes(
        &self,
        _request: &ResourceRequest,
        _nodes: Vec<NodeInfo>,
    ) -> ResourceResult<MemorySelection> {
        panic!("selection reached");
    }
}

/// Run the full lifecycle on slot 0 and return the node after apply.
fn run(options: ResourceOptions, scheduler: &dyn Scheduler) -> (Node, SchedulePlan) {
    let request = make_request(options).unwrap();
    let select = request.make_scheduler(scheduler);
    let (plan, total) = select(snapshot()).unwrap();
    assert_eq!(total, 1);

    let before = ledger();
    let mut node = before.clone();

    plan.apply_changes_on_node(&mut node, &[0]).unwrap();
    let applied = node.clone();

    plan.rollback_changes_on_node(&mut node, &[0]).unwrap();
    assert_eq!(node, before, "rollback must restore the ledger exactly");

    let meta = plan
        .dispense(&DispenseOptions { node: &node, index: 0 }, ResourceMeta::default())
        .unwrap();
    assert_eq!(meta.memory_request, options.memory_request);
    assert_eq!(meta.cpu_bind, options.cpu_bind);

    (applied, plan)
}

#[test]
fn cpu_bind_request_pins_cores_and_rolls_back() {
    let options = ResourceOptions {
        cpu_quota_request: 0.5,
        cpu_quota_limit: 1.0,
        cpu_bind: true,
        memory_request: 512,
        memory_limit: 1024,
    };

    let (applied, plan) = run(options, &CpuOnly);

    assert!(applied.cpu()["0"] < 10_000);
    assert!(plan.is_bind());
    // Cores span both NUMA domains, so per-domain memory is untouched.
    assert_eq!(applied.numa_memory(), ledger().numa_memory());
    assert_eq!(applied.mem_cap(), 10_240 - 512);
}

#[test]
fn share_request_with_quota_deducts_memory() {
    let options = ResourceOptions {
        cpu_quota_request: 0.5,
        cpu_quota_limit: 1.0,
        cpu_bind: false,
        memory_request: 512,
        memory_limit: 1024,
    };

    let (applied, _) = run(options, &MemoryOnly);

    assert!(applied.mem_cap() < 10_240);
    assert_eq!(applied.cpu(), ledger().cpu());
    assert_eq!(applied.cpu_used(), 5_000);
}

#[test]
fn memory_only_request_deducts_memory() {
    let options = ResourceOptions {
        cpu_quota_request: 0.0,
        cpu_quota_limit: 0.0,
        cpu_bind: false,
        memory_request: 512,
        memory_limit: 1024,
    };

    let (applied, _) = run(options, &MemoryOnly);

    assert!(applied.mem_cap() < 10_240);
    assert_eq!(applied.cpu()["0"], 10_000);
    assert_eq!(applied.cpu_used(), 0);
}

#[test]
fn negative_memory_never_reaches_selection() {
    let options = ResourceOptions {
        memory_request: -1,
        ..Default::default()
    };

    let outcome = make_request(options).and_then(|request| {
        let select = request.make_scheduler(&Unreachable);
        select(snapshot()).map(|_| ())
    });

    assert!(matches!(outcome, Err(ref err) if err.is_invalid_request()));
}
