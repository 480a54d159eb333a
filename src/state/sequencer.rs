//! The quiz sequence: which page the controller shows next, or shows again after a step back.
//!
//! Steps are always made relative to the cached cursor, never to the page a client claims to
//! show. The controller quotes the sync revision it last saw; a stale value gets a
//! resynchronising reply instead of a step, so a repeated tap cannot skip a page.

use crate::{
    dao::{
        models::{Page, StaticPage},
        records::Records,
    },
    error::ServiceError,
    state::{
        broker::{Puppet, Reply, Route, main_round, main_static, path_to_page},
        contest::ContestCache,
        format::RoundFormat,
        quiz::QuizCache,
        scoring::{calculate_totals_and_rank, restart_quiz},
    },
};

/// Prompter text for a page of a round.
pub fn prompt(page: char, n_round: u32) -> String {
    match page {
        'A' => format!("R{n_round} Answers"),
        'D' => format!("Tie {n_round} Sudden Death"),
        'Q' => format!("R{n_round} Questions"),
        'S' => format!("R{n_round} Scores"),
        'T' => format!("Tie {n_round} Questions"),
        'U' => format!("Tie {n_round} Answers"),
        'V' => format!("Tie {n_round} Scores"),
        _ => "??".into(),
    }
}

/// Move the cursor to a round and decode its format.
pub fn set_round(
    contest: &mut ContestCache,
    records: &Records,
    n_round: u32,
    slide_items: usize,
) -> Result<(), ServiceError> {
    let round = records
        .round_by_order(n_round)
        .ok_or_else(|| ServiceError::NotFound(format!("round {n_round} is not defined")))?;
    contest.format = RoundFormat::decode(&round.format, slide_items);
    contest.contest_mut().current_round = n_round;
    Ok(())
}

/// Show the scores for a round if they are published, or the waiting page.
pub fn scores_or_wait(quiz: &QuizCache, contest: &mut ContestCache, n_round: u32) -> Route {
    let scored = quiz.quiz.scoring_round.saturating_sub(1);
    let c = contest.contest_mut();

    if n_round <= scored {
        // the audience sees scores once the controller moves to them
        c.scoreboard_round = n_round;
        if n_round < quiz.counts.full {
            c.current_page = Page::Scores;
            Route::QuizScores
        } else {
            c.current_page = Page::Final;
            Route::QuizFinal
        }
    } else {
        c.current_page = Page::ScoresWait;
        Route::QuizWait
    }
}

/// Resynchronisation reply for a controller quoting a stale sync revision.
pub fn check_sync(quiz: &QuizCache, contest: &ContestCache, sync: i64) -> Option<Reply> {
    if !contest.sync.differs(sync) {
        return None;
    }

    let reply = if contest.contest.current_page == Page::Static {
        main_static(contest, None, -1, Puppet::CONTROLLER)
    } else {
        main_round(quiz, contest, None, -1, -1, Puppet::CONTROLLER)
    };
    Some(reply)
}

/// Rotate the liveness tick every five seconds. Returns true when it changed.
pub fn update_tick(contest: &mut ContestCache, second: u32) -> bool {
    let tick = if second % 10 == 0 {
        "/"
    } else if second % 5 == 0 {
        "\\"
    } else {
        return false;
    };
    contest.contest_mut().tick = tick.into();
    true
}

/// Refresh the quizmaster's prompter for the current page.
pub fn set_prompts(quiz: &QuizCache, contest: &mut ContestCache) {
    let counts = quiz.counts;
    let full = counts.full;
    let s = &contest.contest;
    let n = s.current_round;
    let defer = counts.defer_at(n);
    let tied = contest.is_tied;
    let n_tie = n.saturating_sub(full);

    let (now, next): (String, String) = match s.current_page {
        Page::Static => match s.current_static {
            StaticPage::Start => ("Welcome".into(), prompt('Q', n)),
            StaticPage::Interval => ("Interval".into(), prompt('Q', n + defer + 1)),
            StaticPage::End => ("End".into(), String::new()),
        },
        Page::Questions => {
            if n <= defer {
                (prompt('Q', n), prompt('Q', n + 1))
            } else if contest.format.combined {
                let next = if n < counts.total() {
                    prompt('D', n_tie + 1)
                } else {
                    "Goodbye".into()
                };
                (prompt('D', n_tie), next)
            } else if n <= full {
                (prompt('Q', n), prompt('A', n - defer))
            } else {
                (prompt('T', n_tie), prompt('U', n_tie))
            }
        }
        Page::Answers => {
            if n <= full {
                ("Answers".into(), "Scores".into())
            } else {
                (prompt('U', n_tie), prompt('V', n_tie))
            }
        }
        Page::ScoresWait => {
            let next = if contest.format.interval {
                "Interval".into()
            } else if n + defer < full {
                prompt('Q', n + defer + 1)
            } else if n < full {
                prompt('A', n + 1)
            } else {
                "Goodbye".into()
            };
            ("Waiting".into(), next)
        }
        Page::Scores => {
            let next = if contest.format.interval {
                "Interval".into()
            } else if n + defer < full {
                prompt('Q', n + defer + 1)
            } else {
                prompt('A', n + 1)
            };
            ("Scores".into(), next)
        }
        Page::Final => {
            if n <= full {
                let next = if tied && counts.tie > 0 {
                    prompt('T', 1)
                } else {
                    "Goodbye".into()
                };
                ("Scores".into(), next)
            } else {
                let next = if tied && n_tie < counts.tie {
                    prompt('T', n_tie + 1)
                } else {
                    "Goodbye".into()
                };
                (prompt('V', n_tie), next)
            }
        }
        _ => ("End".into(), String::new()),
    };

    contest.prompts.do_now = now;
    contest.prompts.do_next = next;
    contest.changed_quizmaster();
}

/// Reopen the controller on the current page, typically from another device.
pub fn resume(
    quiz: &QuizCache,
    contest: &mut ContestCache,
    records: &Records,
    slide_items: usize,
) -> Result<String, ServiceError> {
    let n_round = contest.contest.current_round;
    match set_round(contest, records, n_round, slide_items) {
        Ok(()) => {}
        // nothing defined yet is fine on the welcome page
        Err(_) if contest.contest.current_page == Page::Static => {}
        Err(err) => return Err(err),
    }
    contest.contest_mut().touch_controller = true;

    let s = &contest.contest;
    let route = match s.current_page {
        Page::Static => Route::for_page(Page::Static, s.current_static),
        Page::Questions | Page::Answers | Page::Scores | Page::Final | Page::ScoresWait => {
            Route::for_page(s.current_page, s.current_static)
        }
        _ => Route::PuppetError,
    };

    set_prompts(quiz, contest);
    Ok(path_to_page(
        route,
        Puppet::CONTROLLER,
        contest.param(),
        0,
    ))
}

/// Note the slide the controller is showing, for puppets to follow.
pub fn set_slide(
    quiz: &QuizCache,
    contest: &mut ContestCache,
    sync: i64,
    index: u32,
    touch_nav: bool,
) -> Reply {
    if let Some(reply) = check_sync(quiz, contest, sync) {
        return reply;
    }

    let c = contest.contest_mut();
    c.current_index = index;
    // only a restart or resume turns touch navigation back on
    if c.touch_controller && !touch_nav {
        c.touch_controller = false;
    }
    Reply::default()
}

/// Periodic controller poll: reload scores when they change and advance the tick.
pub fn controller_update(
    quiz: &QuizCache,
    contest: &mut ContestCache,
    update: i64,
    second: u32,
) -> Reply {
    let mut changed = false;
    let mut href = String::new();

    let page = contest.contest.current_page;
    if matches!(page, Page::ScoresWait | Page::Scores | Page::Final)
        && quiz.revisions.published.differs(update)
    {
        let n_round = contest.contest.current_round;
        let route = scores_or_wait(quiz, contest, n_round);
        href = path_to_page(route, Puppet::CONTROLLER, n_round, 0);
        changed = true;

        if contest.contest.current_page != page {
            // puppets may look at the index before the controller reloads
            contest.contest_mut().current_index = 0;
            set_prompts(quiz, contest);
        }
    }

    let tick = if update_tick(contest, second) {
        changed = true;
        contest.contest.tick.clone()
    } else {
        String::new()
    };

    if !changed {
        contest.cancel_update();
    }

    Reply {
        href,
        index: contest.contest.current_index,
        tick,
    }
}

/// Steps that may touch scores as well as the cursor.
pub struct Sequencer<'a> {
    /// Quiz cache.
    pub quiz: &'a mut QuizCache,
    /// Contest cache.
    pub contest: &'a mut ContestCache,
    /// Working records of the open transaction.
    pub records: &'a mut Records,
    /// Items per slide from the configuration.
    pub slide_items: usize,
}

impl Sequencer<'_> {
    fn set_round(&mut self, n_round: u32) -> Result<(), ServiceError> {
        set_round(self.contest, self.records, n_round, self.slide_items)
    }

    fn position(&self) -> (Page, StaticPage, u32) {
        let c = &self.contest.contest;
        (c.current_page, c.current_static, c.current_round)
    }

    fn set_page(&mut self, page: Page) {
        self.contest.contest_mut().current_page = page;
    }

    fn set_static(&mut self, sub_page: StaticPage) {
        let c = self.contest.contest_mut();
        c.current_page = Page::Static;
        c.current_static = sub_page;
    }

    fn allow_responses(&mut self) {
        self.quiz.quiz_mut().response_round = self.contest.contest.current_round;
    }

    fn scores_or_wait(&mut self, n_round: u32) -> Route {
        scores_or_wait(self.quiz, self.contest, n_round)
    }

    /// Rank up to a round whose answers are being shown, so the quizmaster can preview the
    /// scores. Unpublished rounds just show the quizmaster that scores are delayed.
    fn prepare_for_scores(&mut self, n_round: u32) {
        if n_round < self.quiz.quiz.scoring_round {
            calculate_totals_and_rank(self.quiz, self.contest, self.records, n_round);
        } else {
            self.contest.contest_mut().quizmaster_round = n_round;
        }
    }

    fn after_scores(&mut self, n_round: u32) -> Result<Route, ServiceError> {
        let counts = self.quiz.counts;
        let defer = counts.defer_at(n_round);

        let route = if n_round + defer < counts.full {
            self.set_page(Page::Questions);
            self.set_round(n_round + defer + 1)?;
            self.allow_responses();
            Route::QuizQuestions
        } else if n_round < counts.full {
            // answers that were deferred
            self.set_page(Page::Answers);
            self.set_round(n_round + 1)?;
            self.prepare_for_scores(n_round + 1);
            Route::QuizAnswers
        } else if n_round < counts.total() {
            self.set_page(Page::Questions);
            self.set_round(n_round + 1)?;
            self.allow_responses();
            Route::QuizQuestions
        } else {
            self.set_static(StaticPage::End);
            Route::QuizStatic
        };
        Ok(route)
    }

    fn finish_step(&mut self, route: Route) -> Reply {
        self.contest.contest_mut().current_index = 0;
        set_prompts(self.quiz, self.contest);
        self.contest.changed_sync();
        Reply::navigate(path_to_page(
            route,
            Puppet::CONTROLLER,
            self.contest.param(),
            0,
        ))
    }

    /// Advance to the next page.
    pub fn next(&mut self, sync: i64) -> Result<Reply, ServiceError> {
        if let Some(reply) = check_sync(self.quiz, self.contest, sync) {
            return Ok(reply);
        }

        let counts = self.quiz.counts;
        let (page, sub_page, n) = self.position();

        let route = match page {
            Page::Static => match sub_page {
                StaticPage::Start => {
                    self.set_page(Page::Questions);
                    self.set_round(1)?;
                    self.allow_responses();
                    Route::QuizQuestions
                }
                StaticPage::Interval => self.after_scores(n)?,
                StaticPage::End => Route::QuizStatic,
            },
            Page::Questions => {
                let defer = counts.defer_at(n);
                let route = if n <= defer {
                    // answers for this round come later
                    self.set_round(n + 1)?;
                    self.allow_responses();
                    Route::QuizQuestions
                } else if self.contest.format.combined {
                    if n < counts.total() {
                        self.set_round(n + 1)?;
                        self.allow_responses();
                        Route::QuizQuestions
                    } else {
                        self.set_static(StaticPage::End);
                        Route::QuizStatic
                    }
                } else {
                    self.set_page(Page::Answers);
                    self.set_round(n - defer)?;
                    self.prepare_for_scores(n - defer);
                    Route::QuizAnswers
                };
                // scorers see that questions are closed
                self.quiz.changed_scorer();
                route
            }
            Page::Answers => self.scores_or_wait(n),
            Page::Scores | Page::Final | Page::ScoresWait => {
                if self.contest.format.interval {
                    self.set_static(StaticPage::Interval);
                    Route::QuizStatic
                } else {
                    self.after_scores(n)?
                }
            }
            _ => {
                self.set_static(StaticPage::End);
                Route::QuizStatic
            }
        };

        Ok(self.finish_step(route))
    }

    /// Return to the previous page.
    pub fn back(&mut self, sync: i64) -> Result<Reply, ServiceError> {
        if let Some(reply) = check_sync(self.quiz, self.contest, sync) {
            return Ok(reply);
        }

        let counts = self.quiz.counts;
        let full = counts.full;
        let (page, sub_page, n) = self.position();

        let route = match page {
            Page::Static => match sub_page {
                StaticPage::End => {
                    if self.contest.format.combined {
                        // back to the sudden death round
                        self.set_page(Page::Questions);
                        self.allow_responses();
                        Route::QuizQuestions
                    } else if n != 1 {
                        let last = counts.total();
                        let route = self.scores_or_wait(last);
                        self.set_round(last)?;
                        route
                    } else {
                        Route::QuizStatic
                    }
                }
                StaticPage::Interval => self.scores_or_wait(n),
                StaticPage::Start => Route::QuizStart,
            },
            Page::Questions => {
                let defer = counts.defer_at(n);
                let route = if n <= 1 {
                    self.set_static(StaticPage::Start);
                    Route::QuizStart
                } else if n <= defer + 1 {
                    self.set_round(n - 1)?;
                    self.allow_responses();
                    Route::QuizQuestions
                } else {
                    let earlier = n - defer - 1;
                    let route = self.scores_or_wait(earlier);
                    self.set_round(earlier)?;
                    if self.contest.format.interval {
                        self.set_static(StaticPage::Interval);
                        Route::QuizStatic
                    } else {
                        route
                    }
                };
                self.quiz.changed_scorer();
                route
            }
            Page::Answers => {
                // the quizmaster sees the scores roll back
                self.prepare_for_scores(n.saturating_sub(1));

                let defer = counts.defer_at(n);
                if n > full || n + defer <= full {
                    self.set_page(Page::Questions);
                    self.set_round(n + defer)?;
                    self.allow_responses();
                    Route::QuizQuestions
                } else {
                    let earlier = n - 1;
                    let route = self.scores_or_wait(earlier);
                    self.set_round(earlier)?;
                    route
                }
            }
            Page::Scores | Page::Final | Page::ScoresWait => {
                self.set_page(Page::Answers);
                // redone in case we stepped back because something went wrong
                self.prepare_for_scores(n);
                Route::QuizAnswers
            }
            _ => {
                self.set_static(StaticPage::Start);
                Route::QuizStart
            }
        };

        Ok(self.finish_step(route))
    }

    /// Reset results and open the welcome page, live or as a rehearsal.
    pub fn start(&mut self, live: bool) -> String {
        restart_quiz(self.quiz, self.contest, self.records);
        set_prompts(self.quiz, self.contest);

        let c = self.contest.contest_mut();
        // no tick until the controller sends one
        c.tick = "*".into();
        c.live = live;
        self.contest.changed_sync();

        path_to_page(Route::QuizStart, Puppet::CONTROLLER, 0, 0)
    }
}
