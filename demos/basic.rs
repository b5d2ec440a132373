use cotask::{this_task, CoroTask, Invocation, Task, TaskStatus};

fn main() {
  env_logger::init();

  let mut task = CoroTask::new(Invocation::new(|| {
    for i in 1..=9 {
      println!("step {i}");
      this_task::yield_now();
    }
  }))
  .unwrap();

  let mut suspensions = 0;
  while task.invoke().unwrap() == TaskStatus::Repeat {
    suspensions += 1;
  }
  println!("drove {suspensions} suspensions");
}
